//! The set of directories subscribed to change notifications.
//!
//! Each directory below the root moves through
//! `Unwatched -> Watched -> Removed`, and back to `Watched` when a removed
//! directory is created again. Only `Watched` directories hold a
//! notification subscription.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Unwatched,
    Watched,
    Removed,
}

#[derive(Debug)]
pub struct WatchSet {
    root: PathBuf,
    dirs: HashMap<PathBuf, WatchState>,
}

impl WatchSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: HashMap::new(),
        }
    }

    pub fn state(&self, dir: &Path) -> WatchState {
        self.dirs.get(dir).copied().unwrap_or(WatchState::Unwatched)
    }

    /// True when `dir` currently holds a subscription.
    pub fn contains(&self, dir: &Path) -> bool {
        self.state(dir) == WatchState::Watched
    }

    /// `Unwatched | Removed -> Watched`. Returns false for directories
    /// outside the root and for directories already watched.
    pub fn watch(&mut self, dir: &Path) -> bool {
        if !dir.starts_with(&self.root) {
            return false;
        }
        self.dirs.insert(dir.to_path_buf(), WatchState::Watched) != Some(WatchState::Watched)
    }

    /// `Watched -> Removed` for `dir` and every watched directory below it.
    /// Returns the directories that made the transition, deepest first; an
    /// empty result means `dir` was not a watched directory.
    pub fn remove(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut removed = Vec::new();

        for (d, state) in self.dirs.iter_mut() {
            if *state == WatchState::Watched && d.starts_with(dir) {
                *state = WatchState::Removed;
                removed.push(d.clone());
            }
        }

        removed.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        removed
    }

    /// Number of watched directories
    pub fn len(&self) -> usize {
        self.dirs.values().filter(|s| **s == WatchState::Watched).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
