//! Utility functions for titles, sizes and path manipulation

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Maximum length of a sanitized title, in characters
const MAX_TITLE_CHARS: usize = 200;

/// Characters that break paths on at least one major platform
const INVALID_TITLE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a free-text title safe to embed in a filename
///
/// Replaces path-breaking and control characters with `_`, trims surrounding
/// whitespace and truncates to 200 characters.
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("  AC/DC: Live?  "), "AC_DC_ Live_");
/// assert_eq!(sanitize_title("tab\there"), "tab_here");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .map(|c| {
            if INVALID_TITLE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced.trim_end().to_string()
}

/// Format a byte count for display
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::format_size;
///
/// assert_eq!(format_size(512), "512.0 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Get a path that does not collide with an existing file
///
/// If `path` exists, appends ` (1)`, ` (2)`, ... to the stem until a free
/// name is found.
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::get_unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/playlist.zip");
/// let unique = get_unique_path(path).unwrap();
/// // If /tmp/playlist.zip exists, returns /tmp/playlist (1).zip
/// ```
pub fn get_unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Other(format!("cannot extract file stem of {}", path.display())))?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().ok_or_else(|| {
        Error::Other(format!("cannot extract parent directory of {}", path.display()))
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::Other(format!(
        "could not find unique filename for {} after {} attempts",
        path.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

/// Create a new, empty directory at `path`, or at the first free ` (N)` variant
///
/// Missing parents are created. Never returns a directory that already existed.
pub async fn create_fresh_dir(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    for _ in 0..MAX_RENAME_ATTEMPTS {
        let candidate = get_unique_path(path)?;
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            // Lost a race with another run; look again
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Other(format!(
        "could not create a fresh directory for {}",
        path.display()
    )))
}
