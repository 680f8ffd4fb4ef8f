//! The main processing cycle: sweep the dump root, prune emptied dump
//! directories, then archive aged backups.

use crate::archive::{ArchiveReport, Archiver};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::fs::cleanup::cleanup_empty_dirs;
use crate::metrics::Metrics;
use crate::scanner::{Scanner, SweepReport};
use crate::utils::errors::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of one cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub sweep: SweepReport,
    pub dump_dirs_removed: usize,
    pub archive: ArchiveReport,
}

pub struct Agent {
    config: Arc<Config>,
    scanner: Scanner,
    archiver: Archiver,
    metrics: Arc<Metrics>,
}

impl Agent {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher, metrics: Arc<Metrics>) -> Self {
        Self {
            scanner: Scanner::new(Arc::clone(&config), dispatcher),
            archiver: Archiver::from_config(&config),
            config,
            metrics,
        }
    }

    /// Run one cycle. Only errors on the dump or backup root are returned.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let sweep = self.scanner.sweep().await?;

        let dump_dir = self.config.dump_dir.clone();
        let dump_dirs_removed = tokio::task::spawn_blocking(move || cleanup_empty_dirs(&dump_dir)).await?;

        let archiver = self.archiver.clone();
        let archive = tokio::task::spawn_blocking(move || archiver.archive()).await??;
        self.metrics.record_archives(archive.archives as u64);

        if archive.archives > 0 || archive.failed_groups > 0 {
            info!(
                "Archive pass: {} archives, {} files, {} failed days",
                archive.archives, archive.files_archived, archive.failed_groups
            );
        }

        Ok(CycleReport {
            sweep,
            dump_dirs_removed,
            archive,
        })
    }

    /// Run a cycle every `scan_interval` until cancelled. The first cycle
    /// starts immediately; a cycle in progress is finished before returning.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!("Start main loop, every {:?}", self.config.scan_interval);

        loop {
            let report = self.run_cycle().await?;
            debug!("Cycle finished: {:?}", report);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval) => {}
            }
        }

        info!("Main loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::test_support::Collector;
    use crate::utils::errors::AgentError;
    use axum::http::StatusCode;
    use filetime::FileTime;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_aged(path: &Path, age: Duration) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"core dumped").unwrap();
        let mtime = FileTime::from_system_time(SystemTime::now() - age);
        filetime::set_file_mtime(path, mtime).unwrap();
    }

    fn agent(config: Config) -> (Agent, Arc<Metrics>) {
        let config = Arc::new(config);
        let metrics = Metrics::new();
        let dispatcher = Dispatcher::new(Arc::clone(&config), Arc::clone(&metrics));
        (Agent::new(config, dispatcher, Arc::clone(&metrics)), metrics)
    }

    #[tokio::test]
    async fn test_cycle_sends_moves_and_archives() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let collector = Collector::start(StatusCode::CREATED).await;

        write_aged(&dumps.path().join("app/2024/core.txt"), Duration::from_secs(3600));
        write_aged(&backup.path().join("app/old.txt"), Duration::from_secs(10 * 86_400));
        fs::create_dir_all(dumps.path().join("app/stale/empty")).unwrap();

        let (agent, metrics) = agent(test_config(dumps.path(), backup.path(), &collector.url));
        let report = agent.run_cycle().await.unwrap();

        assert_eq!(report.sweep.dispatched, 1);
        assert_eq!(report.archive.archives, 1);
        assert_eq!(report.archive.files_archived, 1);
        assert!(report.dump_dirs_removed >= 2);
        assert!(backup.path().join("app/2024/core.txt").exists());
        assert!(!backup.path().join("app/old.txt").exists());
        assert!(!dumps.path().join("app/stale").exists());
        assert!(dumps.path().join("app").is_dir());
        assert_eq!(collector.received().len(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dumps_sent, 1);
        assert_eq!(snapshot.archives_created, 1);
    }

    #[tokio::test]
    async fn test_missing_dump_root_stops_the_loop() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let collector = Collector::start(StatusCode::CREATED).await;
        let config = test_config(dumps.path(), backup.path(), &collector.url);
        let (agent, _) = agent(config);

        fs::remove_dir(dumps.path()).unwrap();

        let result = agent.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(AgentError::Io(_))));
    }

    #[tokio::test]
    async fn test_cancelled_loop_returns_after_one_cycle() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let collector = Collector::start(StatusCode::CREATED).await;
        let (agent, _) = agent(test_config(dumps.path(), backup.path(), &collector.url));

        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), agent.run(cancel))
            .await
            .unwrap()
            .unwrap();
    }
}
