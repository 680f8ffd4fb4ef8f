//! Removal of directories left empty by dispatch and archiving.

use std::fs;
use std::path::Path;
use tracing::{debug, error};
use walkdir::WalkDir;

/// Remove empty directories below `root`.
///
/// The root and its immediate children (one directory per application) are
/// always kept. Directories are visited children first, so a directory that
/// only contained empty directories is removed in the same pass.
/// Returns the number of directories removed.
pub fn cleanup_empty_dirs(root: &Path) -> usize {
    let mut removed = 0;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(2)
        .contents_first(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Cleanup walk error: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        match is_empty_dir(entry.path()) {
            Ok(true) => match fs::remove_dir(entry.path()) {
                Ok(()) => {
                    debug!("Removed empty directory {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => error!("Error removing empty directory {}: {}", entry.path().display(), e),
            },
            Ok(false) => {}
            Err(e) => error!("Error reading directory {}: {}", entry.path().display(), e),
        }
    }

    removed
}

fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}
