//! File metadata carried into archive entries and used to detect
//! that two paths name the same file.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Header fields of one tarball entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Seconds since the Unix epoch
    pub modified: u64,
    /// Unix mode bits
    pub permissions: u32,
}

impl FileMetadata {
    pub fn from_metadata(metadata: &fs::Metadata) -> std::io::Result<Self> {
        let modified = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode()
        };

        #[cfg(not(unix))]
        let permissions = if metadata.permissions().readonly() { 0o444 } else { 0o644 };

        Ok(Self {
            size: metadata.len(),
            modified,
            permissions,
        })
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Self::from_metadata(&fs::metadata(path)?)
    }
}

/// True when both metadata describe the same file (device and inode).
#[cfg(unix)]
pub fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
pub fn same_file(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    #[test]
    fn test_entry_fields_follow_the_file() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let dump = dir.path().join("core.txt");
        fs::write(&dump, b"segfault at 0x0")?;
        filetime::set_file_mtime(&dump, FileTime::from_unix_time(1_710_496_800, 0))?;

        let metadata = FileMetadata::from_path(&dump)?;

        assert_eq!(metadata.size, 15);
        assert_eq!(metadata.modified, 1_710_496_800);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_mode_bits_are_kept() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        let dump = dir.path().join("core.txt");
        fs::write(&dump, b"")?;
        fs::set_permissions(&dump, fs::Permissions::from_mode(0o640))?;

        assert_eq!(FileMetadata::from_path(&dump)?.permissions & 0o777, 0o640);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_same_file_through_hard_link() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        fs::write(&a, b"same")?;
        fs::hard_link(&a, &b)?;
        fs::write(&c, b"same")?;

        assert!(same_file(&fs::metadata(&a)?, &fs::metadata(&b)?));
        assert!(!same_file(&fs::metadata(&a)?, &fs::metadata(&c)?));
        Ok(())
    }
}
