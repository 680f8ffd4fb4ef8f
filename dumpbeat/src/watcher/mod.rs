//! Event-driven discovery of dump files.
//!
//! [`DirWatcher`] subscribes every directory of the dump tree to change
//! notifications (one non-recursive watch per directory, tracked in a
//! [`WatchSet`]) and records written files in the shared [`DebounceTable`].
//! [`run_debounce_loop`] periodically drains the files that went quiet and
//! sends them in immediate mode, ahead of the periodic sweep.

pub mod debounce;
pub mod watch_set;

pub use debounce::DebounceTable;
pub use watch_set::{WatchSet, WatchState};

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::fs::walker::{walk_dirs, walk_files};
use crate::utils::errors::Result;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Watches the dump tree and feeds written files into a [`DebounceTable`].
pub struct DirWatcher {
    watcher: RecommendedWatcher,
    watch_set: WatchSet,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    table: Arc<DebounceTable>,
}

impl DirWatcher {
    /// Subscribe `root` and all of its existing subdirectories.
    ///
    /// Registration completes before any event is consumed, so writes into
    /// directories that already exist are never missed. Failing to watch the
    /// root is an error; failures on subdirectories are logged.
    pub fn new(root: &Path, table: Arc<DebounceTable>) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means the watcher task stopped
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        let mut dir_watcher = Self {
            watcher,
            watch_set: WatchSet::new(root),
            events,
            table,
        };

        dir_watcher.watcher.watch(root, RecursiveMode::NonRecursive)?;
        dir_watcher.watch_set.watch(root);
        info!("Added {} to watch", root.display());

        let registered = dir_watcher.register_tree(root)?;
        info!("Watching {} directories under {}", registered + 1, root.display());

        Ok(dir_watcher)
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    /// Consume notifications until cancelled or the notification channel closes.
    ///
    /// Each event is applied on the blocking pool: it stats paths and may
    /// walk a whole new subtree.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Start filesystem watcher");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => event,
            };

            match event {
                Some(Ok(event)) => {
                    let handled = tokio::task::spawn_blocking(move || {
                        self.handle_event(event);
                        self
                    })
                    .await;

                    self = match handled {
                        Ok(watcher) => watcher,
                        Err(e) => {
                            error!("Watch event handler failed: {}", e);
                            return;
                        }
                    };
                }
                Some(Err(e)) => error!("Watch error: {}", e),
                None => {
                    warn!("Notification channel closed");
                    break;
                }
            }
        }

        info!("Filesystem watcher stopped");
    }

    /// Apply one notification to the watch set and the debounce table.
    pub fn handle_event(&mut self, event: Event) {
        debug!("event: {:?}", event);

        for path in &event.paths {
            match event.kind {
                EventKind::Create(_) => {
                    if path.is_dir() {
                        self.on_dir_created(path);
                    }
                }
                EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                    self.on_file_written(path);
                }
                EventKind::Modify(ModifyKind::Name(_)) => {
                    // Renames report both ends; what still exists is the new name
                    if path.is_dir() {
                        self.on_dir_created(path);
                    } else if path.exists() {
                        self.on_file_written(path);
                    } else {
                        self.on_removed(path);
                    }
                }
                EventKind::Remove(_) => self.on_removed(path),
                _ => {}
            }
        }
    }

    fn on_file_written(&mut self, path: &Path) {
        match std::fs::metadata(path) {
            Ok(metadata) if !metadata.is_dir() => {
                debug!("modified file: {}", path.display());
                self.table.record(path.to_path_buf(), Instant::now());
            }
            Ok(_) => {}
            Err(e) => debug!("Cannot stat {}: {}", path.display(), e),
        }
    }

    fn on_dir_created(&mut self, dir: &Path) {
        if let Err(e) = self.register_tree(dir) {
            error!("Error adding directory {} to watch: {}", dir.display(), e);
            return;
        }

        // Files written before the watch was in place produced no event
        let table = Arc::clone(&self.table);
        if let Err(e) = walk_files(dir, |file| table.record(file.path, Instant::now())) {
            debug!("Cannot list new directory {}: {}", dir.display(), e);
        }
    }

    fn on_removed(&mut self, path: &Path) {
        let removed = self.watch_set.remove(path);
        if removed.is_empty() {
            self.table.remove(path);
            return;
        }

        for dir in removed {
            // The kernel usually dropped the watch together with the directory
            if let Err(e) = self.watcher.unwatch(&dir) {
                debug!("Unwatch {}: {}", dir.display(), e);
            }
            info!("Removed directory {} from watch", dir.display());
        }
    }

    /// Watch `dir` and every directory below it that is not watched yet.
    /// Returns the number of newly watched directories.
    fn register_tree(&mut self, dir: &Path) -> Result<usize> {
        let mut found: Vec<PathBuf> = Vec::new();
        walk_dirs(dir, |d| found.push(d.to_path_buf()))?;

        let mut added = 0;
        for d in found {
            if self.watch_set.contains(&d) {
                continue;
            }
            match self.watcher.watch(&d, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    if self.watch_set.watch(&d) {
                        added += 1;
                        info!("Added {} to watch", d.display());
                    }
                }
                Err(e) => error!("Error watching {}: {}", d.display(), e),
            }
        }

        Ok(added)
    }
}

/// Every `quiet` period, send the files whose last write is older than `quiet`.
///
/// Files are only sent here, never moved: the periodic sweep picks them up
/// later for relocation.
pub async fn run_debounce_loop(
    table: Arc<DebounceTable>,
    dispatcher: Dispatcher,
    quiet: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(quiet);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for path in table.drain_quiescent(quiet, Instant::now()) {
                    match dispatcher.dispatch_path(&path).await {
                        Ok(DispatchOutcome::Skipped) => debug!("Skipped {}", path.display()),
                        Ok(_) => {}
                        Err(e) => error!("Error processing file {}: {}", path.display(), e),
                    }
                }
            }
        }
    }

    info!("Debounce loop stopped");
}
