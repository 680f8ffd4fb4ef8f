//! Directory traversal over the dump and backup trees.
//!
//! Errors on individual entries are logged and the entry is skipped; only a
//! failure to read the walk root itself is returned to the caller.

use crate::utils::errors::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Information about a regular file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: SystemTime,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Self> {
        let metadata = entry.metadata()?;
        Self::from_metadata(entry.path(), root, &metadata)
    }

    /// Build from already fetched metadata.
    pub fn from_metadata(path: &Path, root: &Path, metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();

        Ok(Self {
            path: path.to_path_buf(),
            relative_path,
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }

    /// Stat `path` and describe it relative to `root`.
    pub fn stat(path: &Path, root: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Self::from_metadata(path, root, &metadata)
    }

    /// Time elapsed since the last modification; zero for mtimes in the future.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Walk a directory tree and call `callback` for every regular file.
pub fn walk_files<F>(root: &Path, mut callback: F) -> Result<()>
where
    F: FnMut(FileInfo),
{
    for entry in walk_entries(root)? {
        if !entry.file_type().is_file() {
            continue;
        }

        match FileInfo::from_entry(&entry, root) {
            Ok(info) => callback(info),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    Ok(())
}

/// Walk a directory tree and call `callback` for every directory, root included.
pub fn walk_dirs<F>(root: &Path, mut callback: F) -> Result<()>
where
    F: FnMut(&Path),
{
    for entry in walk_entries(root)? {
        if entry.file_type().is_dir() {
            callback(entry.path());
        }
    }

    Ok(())
}

/// Walk entries, logging and skipping everything below the root that fails.
fn walk_entries(root: &Path) -> Result<impl Iterator<Item = DirEntry>> {
    // Surface an unreadable root as an error rather than a skipped entry
    std::fs::read_dir(root)?;

    Ok(WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Walk error: {}", e);
                None
            }
        }))
}

/// Count regular files under `root`; any error fails the whole count.
pub fn count_files(root: &Path) -> std::io::Result<usize> {
    let mut count = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }

    Ok(count)
}
