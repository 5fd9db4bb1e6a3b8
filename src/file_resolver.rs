//! Locating the artifact a backend produced
//!
//! Backends do not always report where they wrote a file (templates, merges and
//! audio extraction all rename it). After a fetch the output directory is scanned
//! for media files and the best candidate is chosen in three tiers:
//!
//! 1. a file whose stem contains the expected title (case-insensitive)
//! 2. a file whose stem contains the item id
//! 3. the most recently modified media file
//!
//! Within a tier the newest file wins and name breaks ties, so resolving the
//! same directory twice gives the same answer.

use crate::error::{Error, Result};
use crate::utils::sanitize_title;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extensions accepted as finished media artifacts
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "mkv", "mp3", "m4a", "opus", "ogg", "wav", "flac", "avi", "mov", "flv", "3gp",
];

/// Whether `path` has a recognized media extension
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

struct Candidate {
    path: PathBuf,
    stem: String,
    modified: SystemTime,
}

/// Find the artifact for `expected_title` / `expected_id` inside `output_dir`
///
/// Returns [`Error::FileNotFound`] when the directory is missing or holds no
/// recognized media file.
pub async fn resolve(output_dir: &Path, expected_title: &str, expected_id: &str) -> Result<PathBuf> {
    let not_found = || Error::FileNotFound {
        dir: output_dir.to_path_buf(),
        title: expected_title.to_string(),
    };

    let mut entries = match tokio::fs::read_dir(output_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !is_media_file(&path) {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        candidates.push(Candidate {
            path,
            stem,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    let title = sanitize_title(expected_title).to_lowercase();
    let id = expected_id.to_lowercase();

    let chosen = (!title.is_empty())
        .then(|| newest(candidates.iter().filter(|c| c.stem.contains(&title))))
        .flatten()
        .or_else(|| {
            (!id.is_empty())
                .then(|| newest(candidates.iter().filter(|c| c.stem.contains(&id))))
                .flatten()
        })
        .or_else(|| newest(candidates.iter()));

    match chosen {
        Some(candidate) => {
            tracing::debug!(path = %candidate.path.display(), "resolved downloaded file");
            Ok(candidate.path.clone())
        }
        None => Err(not_found()),
    }
}

fn newest<'a>(candidates: impl Iterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    candidates.max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            // Reverse name order so the lexicographically smallest name wins a tie
            .then_with(|| b.path.cmp(&a.path))
    })
}
