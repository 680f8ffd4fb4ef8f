//! Bounded loading of dump content.
//!
//! Files up to the configured ceiling are read whole; bigger files only
//! contribute a fixed-size prefix so a single dump cannot blow up memory or
//! the request size.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of bytes sent for files above the size ceiling
pub const PREFIX_LEN: u64 = 4096;

#[derive(Debug, Clone, Copy)]
pub struct ContentLoader {
    max_bytes: u64,
    prefix_len: u64,
}

impl ContentLoader {
    /// Loader with the given ceiling and the default prefix length.
    pub fn new(max_bytes: u64) -> Self {
        Self::with_prefix(max_bytes, PREFIX_LEN)
    }

    pub fn with_prefix(max_bytes: u64, prefix_len: u64) -> Self {
        Self { max_bytes, prefix_len }
    }

    /// True when a file of `size` bytes is truncated to the prefix.
    pub fn is_oversized(&self, size: u64) -> bool {
        size > self.max_bytes
    }

    /// Read `path`, whose size was observed as `size`.
    pub fn load(&self, path: &Path, size: u64) -> std::io::Result<Vec<u8>> {
        if self.is_oversized(size) {
            tracing::info!(
                "File {} exceeds maximum size of {} bytes, sending the first {} bytes",
                path.display(),
                self.max_bytes,
                self.prefix_len
            );
            let mut buf = Vec::with_capacity(self.prefix_len as usize);
            File::open(path)?.take(self.prefix_len).read_to_end(&mut buf)?;
            Ok(buf)
        } else {
            std::fs::read(path)
        }
    }
}
