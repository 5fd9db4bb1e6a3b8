//! Ordered ZIP packaging of batch artifacts
//!
//! Entries are written in ordinal order with a zero-padded ordinal prefix,
//! so the archive reflects selection order no matter when each item finished.

use crate::error::{Error, Result};
use crate::types::ArchiveInfo;
use crate::utils::get_unique_path;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Width of zero-padded ordinals for a selection of `count` items
pub fn ordinal_width(count: usize) -> usize {
    count.max(1).to_string().len().max(3)
}

/// Zero-padded ordinal prefix, e.g. `007`
pub fn ordinal_prefix(ordinal: usize, width: usize) -> String {
    format!("{:0width$}", ordinal, width = width)
}

/// Archive entry name for an artifact
pub fn entry_name(ordinal: usize, width: usize, file_name: &str) -> String {
    format!("{}_{}", ordinal_prefix(ordinal, width), file_name)
}

/// Package `files` into a ZIP at `archive_path`
///
/// `files` pairs each artifact with its 1-based selection ordinal; `count` is
/// the size of the selection and fixes the prefix width. An existing file at
/// `archive_path` is never overwritten: a numbered sibling is used instead.
pub async fn package(
    files: &[(usize, PathBuf)],
    count: usize,
    archive_path: &Path,
) -> Result<ArchiveInfo> {
    if files.is_empty() {
        return Err(Error::Archive("no files to package".to_string()));
    }

    let mut ordered = files.to_vec();
    ordered.sort_by_key(|(ordinal, _)| *ordinal);
    let width = ordinal_width(count.max(ordered.len()));

    let archive_path = archive_path.to_path_buf();
    let info = spawn_blocking(move || write_archive(&ordered, width, &archive_path))
        .await
        .map_err(|e| Error::Archive(format!("archive task panicked: {}", e)))??;

    info!(
        path = ?info.path,
        entries = info.entries.len(),
        size_bytes = info.size_bytes,
        "archive created"
    );
    Ok(info)
}

fn write_archive(files: &[(usize, PathBuf)], width: usize, archive_path: &Path) -> Result<ArchiveInfo> {
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let path = get_unique_path(archive_path)?;

    let mut writer = ZipWriter::new(BufWriter::new(File::create(&path)?));
    let mut entries = Vec::with_capacity(files.len());

    for (ordinal, source) in files {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Archive(format!("not a file: {}", source.display())))?;
        let name = entry_name(*ordinal, width, &file_name);

        let mut input = File::open(source)?;
        let large = input.metadata()?.len() >= u64::from(u32::MAX);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(large);

        debug!(entry = %name, source = ?source, "adding archive entry");
        writer.start_file(name.as_str(), options)?;
        std::io::copy(&mut input, &mut writer)?;
        entries.push(name);
    }

    writer.finish()?.flush()?;
    let size_bytes = std::fs::metadata(&path)?.len();

    Ok(ArchiveInfo {
        path,
        size_bytes,
        entries,
    })
}
