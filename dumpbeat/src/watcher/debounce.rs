//! Per-path debouncing of write notifications.
//!
//! A file is considered complete once no write has been seen for the quiet
//! period. The table is shared between the watcher task, which records
//! writes, and the debounce loop, which drains quiescent entries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct DebounceTable {
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl DebounceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write to `path` at `at`, replacing any earlier timestamp.
    pub fn record(&self, path: PathBuf, at: Instant) {
        self.entries.lock().insert(path, at);
    }

    /// Remove and return every path whose last write is older than `quiet`
    /// relative to `now`.
    pub fn drain_quiescent(&self, quiet: Duration, now: Instant) -> Vec<PathBuf> {
        let mut entries = self.entries.lock();
        let mut drained = Vec::new();

        entries.retain(|path, last_write| {
            if now.saturating_duration_since(*last_write) > quiet {
                drained.push(path.clone());
                false
            } else {
                true
            }
        });

        drained
    }

    /// Forget `path`. Returns whether it was present.
    pub fn remove(&self, path: &Path) -> bool {
        self.entries.lock().remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
