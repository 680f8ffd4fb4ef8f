//! Moving processed dumps into the backup tree.

use crate::fs::metadata::same_file;
use crate::utils::errors::{AgentError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Destination of `src` when the tree under `src_root` is mirrored under `dst_root`.
pub fn backup_path(src: &Path, src_root: &Path, dst_root: &Path) -> PathBuf {
    let relative = src.strip_prefix(src_root).unwrap_or_else(|_| {
        Path::new(src.file_name().unwrap_or(src.as_os_str()))
    });
    dst_root.join(relative)
}

/// Move `src` into the mirror of its directory under `dst_root`, creating
/// directories as needed. Returns the new location.
pub fn relocate(src: &Path, src_root: &Path, dst_root: &Path) -> Result<PathBuf> {
    let dst = backup_path(src, src_root, dst_root);

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|source| AgentError::Relocation {
            from: src.to_path_buf(),
            to: dst.clone(),
            source,
        })?;
    }

    move_file(src, &dst)?;
    Ok(dst)
}

/// Rename `src` to `dst`, falling back to copy and delete when renaming is
/// not possible (for instance across devices).
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    move_file_with(src, dst, |from, to| fs::rename(from, to))
}

fn move_file_with<R>(src: &Path, dst: &Path, rename: R) -> Result<()>
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match rename(src, dst) {
        Ok(()) => return Ok(()),
        Err(e) => debug!("Rename of {} failed ({}), copying instead", src.display(), e),
    }

    let wrap = |source: io::Error| AgentError::Relocation {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    };

    let copied = copy_file(src, dst).map_err(wrap)?;
    if !copied {
        // Destination already is the source
        return Ok(());
    }

    if let Err(e) = fs::remove_file(src) {
        error!("{}: Error removing file after copy: {}", src.display(), e);
        return Err(wrap(e));
    }

    Ok(())
}

/// Copy a regular file. Returns `false` when `dst` already names the same
/// file and nothing had to be done.
fn copy_file(src: &Path, dst: &Path) -> io::Result<bool> {
    let src_meta = fs::metadata(src)?;
    if !src_meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("non-regular source file {}", src.display()),
        ));
    }

    match fs::metadata(dst) {
        Ok(dst_meta) => {
            if !dst_meta.is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("non-regular destination file {}", dst.display()),
                ));
            }
            if same_file(&src_meta, &dst_meta) {
                return Ok(false);
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if fs::hard_link(src, dst).is_ok() {
        return Ok(true);
    }

    let mut input = File::open(src)?;
    let mut output = File::create(dst)?;
    io::copy(&mut input, &mut output)?;
    output.sync_all()?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path_mirrors_tree() {
        let dst = backup_path(
            Path::new("/dumps/app/2024/core.txt"),
            Path::new("/dumps"),
            Path::new("/backup-dumps"),
        );
        assert_eq!(dst, PathBuf::from("/backup-dumps/app/2024/core.txt"));
    }

    #[test]
    fn test_relocate_creates_directories() -> Result<()> {
        let dumps = TempDir::new()?;
        let backup = TempDir::new()?;
        fs::create_dir_all(dumps.path().join("app/sub"))?;
        let src = dumps.path().join("app/sub/core.txt");
        fs::write(&src, b"panic")?;

        let dst = relocate(&src, dumps.path(), backup.path())?;

        assert_eq!(dst, backup.path().join("app/sub/core.txt"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dst)?, b"panic");
        Ok(())
    }

    #[test]
    fn test_copy_file_replaces_existing_destination() -> io::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"new")?;
        fs::write(&dst, b"old")?;

        assert!(copy_file(&src, &dst)?);
        assert_eq!(fs::read(&dst)?, b"new");
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_copy_onto_same_file_is_noop() -> io::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"data")?;
        fs::hard_link(&src, &dst)?;

        assert!(!copy_file(&src, &dst)?);
        assert_eq!(fs::read(&src)?, b"data");
        Ok(())
    }

    fn cross_device(_: &Path, _: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "cross-device link"))
    }

    #[test]
    fn test_failed_rename_falls_back_to_copy_and_unlink() -> Result<()> {
        let dumps = TempDir::new()?;
        let backup = TempDir::new()?;
        let src = dumps.path().join("core.txt");
        let dst = backup.path().join("core.txt");
        fs::write(&src, b"stack trace")?;

        move_file_with(&src, &dst, cross_device)?;

        assert!(!src.exists());
        assert_eq!(fs::read(&dst)?, b"stack trace");
        Ok(())
    }

    #[test]
    fn test_fallback_overwrites_stale_destination() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("core.txt");
        let dst = dir.path().join("backup.txt");
        fs::write(&src, b"fresh")?;
        fs::write(&dst, b"stale")?;

        move_file_with(&src, &dst, cross_device)?;

        assert!(!src.exists());
        assert_eq!(fs::read(&dst)?, b"fresh");
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_fallback_onto_same_file_keeps_it() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("core.txt");
        let dst = dir.path().join("linked.txt");
        fs::write(&src, b"data")?;
        fs::hard_link(&src, &dst)?;

        move_file_with(&src, &dst, cross_device)?;

        assert_eq!(fs::read(&dst)?, b"data");
        Ok(())
    }

    #[test]
    fn test_move_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = move_file(&dir.path().join("missing.txt"), &dir.path().join("out.txt"));
        assert!(matches!(result, Err(AgentError::Relocation { .. })));
    }
}
