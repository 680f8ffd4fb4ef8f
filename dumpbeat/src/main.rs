//! Dumpbeat - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use dumpbeat::{
    api,
    config::Config,
    daemon::{agent::Agent, shutdown::ShutdownCoordinator, startup},
    dispatch::Dispatcher,
    metrics::{self, Metrics},
    utils, version, watcher,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version = version::long_version(), about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to watch for dumps
    #[arg(long)]
    dump_dir: Option<String>,

    /// Directory receiving processed dumps
    #[arg(long)]
    backup_dir: Option<String>,

    /// Glob applied to dump file names
    #[arg(long)]
    pattern_file_filter: Option<String>,

    /// Seconds a file must be left untouched before the sweep sends it
    #[arg(long)]
    file_wait_time: Option<u64>,

    /// Collection API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the collection API
    #[arg(long)]
    api_token: Option<String>,

    /// Backups older than this many days are archived
    #[arg(long)]
    days_to_archive: Option<u32>,

    /// Node name sent with every dump (defaults to the host name)
    #[arg(long)]
    node_name: Option<String>,

    /// Size in MB above which only the head of a dump is sent
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Application aliases, `app:alias,app2:alias2`
    #[arg(long)]
    aliases: Option<String>,

    #[arg(long)]
    bucket_prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Consul agent address, empty to skip registration
    #[arg(long)]
    consul_host: Option<String>,

    #[arg(long)]
    consul_service_name: Option<String>,

    #[arg(long)]
    exporter_bind_address: Option<String>,

    #[arg(long)]
    exporter_bind_port: Option<u16>,
}

impl Args {
    /// Command line values as configuration overrides.
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                overrides.push((key, value));
            }
        };

        push("dump_dir", self.dump_dir.clone());
        push("backup_dir", self.backup_dir.clone());
        push("pattern_file_filter", self.pattern_file_filter.clone());
        push("file_wait_time", self.file_wait_time.map(|v| v.to_string()));
        push("api_url", self.api_url.clone());
        push("api_token", self.api_token.clone());
        push("days_to_archive", self.days_to_archive.map(|v| v.to_string()));
        push("node_name", self.node_name.clone());
        push("max_file_size", self.max_file_size.map(|v| v.to_string()));
        push("aliases", self.aliases.clone());
        push("bucket_prefix", self.bucket_prefix.clone());
        push("log_level", self.log_level.clone());
        push("consul_host", self.consul_host.clone());
        push("consul_service_name", self.consul_service_name.clone());
        push("exporter_bind_address", self.exporter_bind_address.clone());
        push("exporter_bind_port", self.exporter_bind_port.map(|v| v.to_string()));

        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref(), args.overrides())?;

    // Initialize logging
    utils::logger::init(&config.log_level)?;

    let span = tracing::info_span!("agent", hostname = %config.node_name);
    run(Arc::new(config)).instrument(span).await
}

async fn run(config: Arc<Config>) -> Result<()> {
    tracing::info!("Starting dumpbeat {}", version::long_version());

    let shutdown = ShutdownCoordinator::new();
    let metrics = Metrics::new();
    let dispatcher = Dispatcher::new(Arc::clone(&config), Arc::clone(&metrics));

    // Metrics exporter
    let addr = exporter_addr(&config)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind exporter on {}", addr))?;
    let app = api::create_router(api::AppState::new(Arc::clone(&metrics)));
    let server_token = shutdown.token();
    let server_handle = tokio::spawn(
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
        }
        .in_current_span(),
    );
    tracing::info!("Metrics endpoint: http://{}/metrics", addr);

    tokio::spawn(
        metrics::run_refresh_loop(
            Arc::clone(&metrics),
            config.dump_dir.clone(),
            config.metrics_interval,
            shutdown.token(),
        )
        .in_current_span(),
    );

    let started = startup::watch_then_register(&config)
        .await
        .context("cannot start watching or register the service")?;
    let registry = started.registry;

    // Event-driven path: watcher feeding the debounce loop
    tokio::spawn(started.watcher.run(shutdown.token()).in_current_span());
    tokio::spawn(
        watcher::run_debounce_loop(started.table, dispatcher.clone(), config.quiet_period, shutdown.token())
            .in_current_span(),
    );

    // Sweep loop
    let agent = Agent::new(Arc::clone(&config), dispatcher, Arc::clone(&metrics));
    let mut agent_handle = tokio::spawn(agent.run(shutdown.token()).in_current_span());

    let outcome = tokio::select! {
        _ = shutdown.wait_for_signal() => {
            shutdown.shutdown();
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut agent_handle).await {
                Ok(Ok(result)) => result.map_err(anyhow::Error::from),
                Ok(Err(e)) => Err(anyhow::Error::from(e).context("main loop panicked")),
                Err(_) => {
                    tracing::warn!("Main loop did not stop within {:?}", SHUTDOWN_TIMEOUT);
                    Ok(())
                }
            }
        }
        joined = &mut agent_handle => {
            shutdown.shutdown();
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::from(e).context("main loop failed")),
                Err(e) => Err(anyhow::Error::from(e).context("main loop panicked")),
            }
        }
    };

    if let Some(client) = registry {
        if let Err(e) = client.deregister(&config.consul_service_name).await {
            tracing::error!("Cannot deregister service: {}", e);
        }
    }

    match tokio::time::timeout(Duration::from_secs(5), server_handle).await {
        Ok(Ok(Ok(()))) => tracing::info!("Exporter shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!("Exporter error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Exporter task panicked: {}", e),
        Err(_) => tracing::warn!("Exporter shutdown timeout, forcing exit"),
    }

    if let Err(e) = &outcome {
        tracing::error!("{:#}", e);
    }
    outcome
}

fn exporter_addr(config: &Config) -> Result<SocketAddr> {
    let ip = if config.exporter_bind_address.is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        config
            .exporter_bind_address
            .parse()
            .with_context(|| format!("invalid exporter bind address {}", config.exporter_bind_address))?
    };
    Ok(SocketAddr::new(ip, config.exporter_bind_port))
}
