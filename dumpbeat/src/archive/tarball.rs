//! Writing one day's backup files into a gzip-compressed tarball.

use crate::fs::metadata::FileMetadata;
use crate::utils::errors::{AgentError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// First free archive name for `day` under `root`: `<day>.tar.gz`, then
/// `<day>.1.tar.gz`, `<day>.2.tar.gz`, ...
pub fn tarball_path(root: &Path, day: &str) -> PathBuf {
    let first = root.join(format!("{}{}", day, ARCHIVE_EXTENSION));
    if !first.exists() {
        return first;
    }

    (1u32..)
        .map(|n| root.join(format!("{}.{}{}", day, n, ARCHIVE_EXTENSION)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Name of the tar entry for `path`: the full path without its root.
pub fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Create `dest` and add every file of `files`, deleting each source once
/// its entry is written. Returns the number of files archived.
///
/// `dest` must not exist yet.
pub fn write_tarball(dest: &Path, files: &[PathBuf]) -> Result<usize> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| AgentError::Archive(format!("could not create tarball file {}: {}", dest.display(), e)))?;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for path in files {
        append_file(&mut builder, path).map_err(|e| {
            AgentError::Archive(format!("could not add file {} to tarball {}: {}", path.display(), dest.display(), e))
        })?;

        fs::remove_file(path).map_err(|e| {
            AgentError::Archive(format!("error removing {} after adding it to {}: {}", path.display(), dest.display(), e))
        })?;
        debug!("Archived {} into {}", path.display(), dest.display());
    }

    let finish = |e: io::Error| AgentError::Archive(format!("could not finish tarball {}: {}", dest.display(), e));
    let encoder = builder.into_inner().map_err(finish)?;
    let file = encoder.finish().map_err(finish)?;
    file.sync_all().map_err(finish)?;

    Ok(files.len())
}

fn append_file<W: io::Write>(builder: &mut tar::Builder<W>, path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    let metadata = FileMetadata::from_metadata(&file.metadata()?)?;

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(metadata.size);
    header.set_mode(metadata.permissions & 0o7777);
    header.set_mtime(metadata.modified);

    // Never copy more than the header announces, even if the file grew
    builder.append_data(&mut header, entry_name(path), file.take(metadata.size))
}
