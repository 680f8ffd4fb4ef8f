//! Sending dumps to the collection API.
//!
//! Two entry points share the build-and-send core:
//! - immediate mode (watcher path) only sends;
//! - sweep mode (periodic scan) sends and then moves the file into the
//!   backup tree.
//!
//! A file can be sent by both paths before the sweep relocates it, so the
//! API sees each dump at least once, occasionally twice.

use crate::config::Config;
use crate::dump::{app_name, bucket_name, resolve_alias, Dump};
use crate::fs::loader::ContentLoader;
use crate::fs::relocate::relocate;
use crate::fs::walker::FileInfo;
use crate::metrics::Metrics;
use crate::utils::errors::{AgentError, Result};
use chrono::{DateTime, Local, Utc};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, error, info};

/// What happens after a successful send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Send only; the file stays for the periodic sweep
    Immediate,
    /// Send, then move into the backup tree
    Sweep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The file did not pass the name filter or is not a regular file
    Skipped,
    Sent,
    /// Sent and moved to the given backup path
    Relocated(PathBuf),
}

#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    client: reqwest::Client,
    loader: ContentLoader,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, metrics: Arc<Metrics>) -> Self {
        let loader = ContentLoader::new(config.max_file_size);
        Self {
            config,
            client: reqwest::Client::new(),
            loader,
            metrics,
        }
    }

    /// Immediate-mode entry point for a path reported by the watcher.
    pub async fn dispatch_path(&self, path: &Path) -> Result<DispatchOutcome> {
        if !self.config.file_filter.matches_path(path) {
            return Ok(DispatchOutcome::Skipped);
        }

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Ok(DispatchOutcome::Skipped);
        }

        let info = FileInfo::from_metadata(path, &self.config.dump_dir, &metadata)?;
        self.dispatch(info, DispatchMode::Immediate).await
    }

    /// Build, send and, in sweep mode, relocate one file.
    pub async fn dispatch(&self, info: FileInfo, mode: DispatchMode) -> Result<DispatchOutcome> {
        debug!("Time to process {}", info.path.display());

        let dump = self.build_dump(&info).await?;

        if let Err(e) = self.send(&dump, &info.path).await {
            self.metrics.record_failed();
            return Err(e);
        }
        self.metrics.record_sent();

        match mode {
            DispatchMode::Immediate => {
                info!("Dump {} sent", info.path.display());
                Ok(DispatchOutcome::Sent)
            }
            DispatchMode::Sweep => {
                let src = info.path.clone();
                let dump_dir = self.config.dump_dir.clone();
                let backup_dir = self.config.backup_dir.clone();
                let dst = tokio::task::spawn_blocking(move || relocate(&src, &dump_dir, &backup_dir))
                    .await??;
                info!("Dump {} sent and moved to {}", info.path.display(), dst.display());
                Ok(DispatchOutcome::Relocated(dst))
            }
        }
    }

    /// Collection endpoint for a file: `{api_url}/{app}/add`.
    pub fn endpoint(&self, path: &Path) -> String {
        let app = resolve_alias(app_name(path, &self.config.dump_dir), &self.config.aliases);
        format!("{}/{}/add", self.config.api_url.trim_end_matches('/'), app)
    }

    async fn build_dump(&self, info: &FileInfo) -> Result<Dump> {
        let loader = self.loader;
        let path = info.path.clone();
        let size = info.size;
        let content = tokio::task::spawn_blocking(move || loader.load(&path, size)).await??;

        let created_at = info
            .modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let modified: DateTime<Local> = info.modified.into();

        Ok(Dump {
            content: String::from_utf8_lossy(&content).into_owned(),
            filename: info.path.to_string_lossy().to_string(),
            created_at,
            node_name: self.config.node_name.clone(),
            root_dir: self.config.dump_dir.to_string_lossy().to_string(),
            file_size: info.size,
            bucket_name: bucket_name(&self.config.bucket_prefix, &modified),
            sent_at: Utc::now(),
        })
    }

    async fn send(&self, dump: &Dump, path: &Path) -> Result<()> {
        let url = self.endpoint(path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(dump)
            .send()
            .await
            .map_err(|e| {
                error!("Error sending dump {} to {}: {}", path.display(), url, e);
                AgentError::Dispatch {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            error!("Dump {} not accepted by {}: {}", path.display(), url, status);
            return Err(AgentError::Dispatch {
                path: path.to_path_buf(),
                reason: format!("{} answered {}", url, status),
            });
        }

        Ok(())
    }
}
