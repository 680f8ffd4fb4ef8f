//! Startup steps whose order matters.

use crate::config::Config;
use crate::registry::{ConsulClient, ServiceRegistration};
use crate::utils::errors::Result;
use crate::watcher::{DebounceTable, DirWatcher};
use std::sync::Arc;
use tracing::info;

pub struct Started {
    pub watcher: DirWatcher,
    pub table: Arc<DebounceTable>,
    /// Set when the service was registered and must be deregistered on exit
    pub registry: Option<ConsulClient>,
}

/// Subscribe the dump tree, then register the service.
///
/// Nothing is registered when the watcher cannot start: no deregistration
/// runs on that path.
pub async fn watch_then_register(config: &Config) -> Result<Started> {
    let table = Arc::new(DebounceTable::new());

    let root = config.dump_dir.clone();
    let watcher_table = Arc::clone(&table);
    let watcher = tokio::task::spawn_blocking(move || DirWatcher::new(&root, watcher_table)).await??;

    let registry = register(config).await?;

    Ok(Started {
        watcher,
        table,
        registry,
    })
}

async fn register(config: &Config) -> Result<Option<ConsulClient>> {
    if config.consul_host.is_empty() {
        info!("No Consul host configured, skipping service registration");
        return Ok(None);
    }

    let client = ConsulClient::new(&config.consul_host)?;
    client
        .register(&ServiceRegistration {
            id: config.consul_service_name.clone(),
            name: config.consul_service_name.clone(),
            address: config.exporter_bind_address.clone(),
            port: config.exporter_bind_port,
        })
        .await?;

    Ok(Some(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::test_support::FakeConsul;
    use crate::utils::errors::AgentError;
    use crate::watcher::WatchState;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_registers_after_the_watcher_is_up() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let consul = FakeConsul::start(StatusCode::OK).await;
        let mut config = test_config(dumps.path(), backup.path(), "http://api");
        config.consul_host = consul.host.clone();

        let started = watch_then_register(&config).await.unwrap();

        assert!(started.registry.is_some());
        assert_eq!(started.watcher.watch_set().state(dumps.path()), WatchState::Watched);
        let registered = consul.registered();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0]["Port"], 9888);
    }

    #[tokio::test]
    async fn test_watcher_failure_registers_nothing() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let consul = FakeConsul::start(StatusCode::OK).await;
        let mut config = test_config(&dumps.path().join("gone"), backup.path(), "http://api");
        config.consul_host = consul.host.clone();

        let result = watch_then_register(&config).await;

        assert!(matches!(result, Err(AgentError::Watch(_))));
        assert!(consul.registered().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_registration_is_fatal() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let consul = FakeConsul::start(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mut config = test_config(dumps.path(), backup.path(), "http://api");
        config.consul_host = consul.host.clone();

        let result = watch_then_register(&config).await;
        assert!(matches!(result, Err(AgentError::Registry(_))));
    }

    #[tokio::test]
    async fn test_empty_consul_host_skips_registration() {
        let dumps = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let config = test_config(dumps.path(), backup.path(), "http://api");

        let started = watch_then_register(&config).await.unwrap();
        assert!(started.registry.is_none());
    }
}
