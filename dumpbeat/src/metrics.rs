//! Process-wide counters and gauges read by the metrics exporter.

use crate::fs::walker::count_files;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Metrics {
    /// Files currently under the dump root, -1 when the last count failed
    files_in_dump_dir: AtomicI64,
    dumps_sent: AtomicU64,
    dumps_failed: AtomicU64,
    archives_created: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_in_dump_dir: i64,
    pub dumps_sent: u64,
    pub dumps_failed: u64,
    pub archives_created: u64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_files_in_dump_dir(&self, count: i64) {
        self.files_in_dump_dir.store(count, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.dumps_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.dumps_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archives(&self, count: u64) {
        self.archives_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_in_dump_dir: self.files_in_dump_dir.load(Ordering::Relaxed),
            dumps_sent: self.dumps_sent.load(Ordering::Relaxed),
            dumps_failed: self.dumps_failed.load(Ordering::Relaxed),
            archives_created: self.archives_created.load(Ordering::Relaxed),
        }
    }

    /// Count the files under `root` and store the result in the gauge.
    pub async fn refresh_file_count(&self, root: PathBuf) {
        let count = match tokio::task::spawn_blocking(move || count_files(&root)).await {
            Ok(Ok(count)) => count as i64,
            Ok(Err(e)) => {
                warn!("Cannot count files in dump directory: {}", e);
                -1
            }
            Err(e) => {
                warn!("File count task failed: {}", e);
                -1
            }
        };
        self.set_files_in_dump_dir(count);
    }
}

/// Refresh the file count gauge every `interval` until cancelled.
pub async fn run_refresh_loop(
    metrics: Arc<Metrics>,
    root: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => metrics.refresh_file_count(root.clone()).await,
        }
    }
    tracing::info!("Metrics refresh stopped");
}
