//! Periodic sweep of the dump tree.
//!
//! Every regular file whose name matches the filter and that has not been
//! modified for at least `file_wait_time` is sent and moved to the backup
//! tree. Younger files are left alone: they may still be being written.

use crate::config::Config;
use crate::dispatch::{DispatchMode, Dispatcher};
use crate::fs::walker::{walk_files, FileInfo};
use crate::utils::errors::Result;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info};

/// Counters of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub dispatched: usize,
    pub failed: usize,
    /// Matching files still inside their wait time
    pub waiting: usize,
}

pub struct Scanner {
    config: Arc<Config>,
    dispatcher: Dispatcher,
}

impl Scanner {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Walk the dump root once and dispatch every ready file in sweep mode.
    ///
    /// Failures on single files are logged and counted; an unreadable dump
    /// root is returned as an error.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let config = Arc::clone(&self.config);
        let now = SystemTime::now();
        let (ready, waiting) = tokio::task::spawn_blocking(move || ready_files(&config, now)).await??;

        let mut report = SweepReport {
            waiting,
            ..SweepReport::default()
        };

        for file in ready {
            let path = file.path.clone();
            match self.dispatcher.dispatch(file, DispatchMode::Sweep).await {
                Ok(_) => report.dispatched += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.dispatched > 0 || report.failed > 0 {
            info!(
                "Sweep finished: {} dispatched, {} failed, {} waiting",
                report.dispatched, report.failed, report.waiting
            );
        } else {
            debug!("Sweep finished: nothing to dispatch, {} waiting", report.waiting);
        }

        Ok(report)
    }
}

/// Files under the dump root that pass the name filter and the wait-time gate
/// at `now`, plus the number of matching files still waiting.
pub fn ready_files(config: &Config, now: SystemTime) -> Result<(Vec<FileInfo>, usize)> {
    let mut ready = Vec::new();
    let mut waiting = 0;

    walk_files(&config.dump_dir, |file| {
        if !config.file_filter.matches_name(&file.file_name()) {
            return;
        }
        if file.age(now) < config.file_wait_time {
            waiting += 1;
            return;
        }
        ready.push(file);
    })?;

    Ok((ready, waiting))
}
