//! Configuration management for the dump agent.
//!
//! Settings are layered: built-in defaults, an optional TOML file,
//! `DUMPBEAT_*` environment variables and finally command-line overrides.
//! The result is validated once into an immutable [`Config`] that every
//! component receives at construction.

use crate::fs::matcher::FileMatcher;
use crate::utils::errors::{AgentError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "DUMPBEAT";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Raw settings as read from file, environment and flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root of the dump tree being watched
    pub dump_dir: PathBuf,

    /// Root of the backup tree processed dumps are moved to
    pub backup_dir: PathBuf,

    /// Glob applied to file names
    pub pattern_file_filter: String,

    /// Seconds a file must stay unmodified before the periodic sweep sends it
    pub file_wait_time: u64,

    /// Dump collection API base URL
    pub api_url: String,

    /// Bearer token for the dump collection API
    pub api_token: String,

    /// Backup files older than this many days are archived
    pub days_to_archive: u32,

    /// Node identifier sent with every dump (host name when empty)
    pub node_name: String,

    /// Size ceiling in megabytes above which only a prefix is sent
    pub max_file_size: u64,

    /// Application aliases, `app:alias,app2:alias2`
    pub aliases: String,

    /// Prefix of the bucket name attached to each dump
    pub bucket_prefix: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Consul agent address; empty disables registration
    pub consul_host: String,

    pub consul_service_name: String,

    pub exporter_bind_address: String,

    pub exporter_bind_port: u16,

    /// Seconds between two periodic sweeps
    pub scan_interval: u64,

    /// Seconds a watched file must be quiet before it is sent
    pub quiet_period: u64,

    /// Seconds between two refreshes of the file count gauge
    pub metrics_interval: u64,
}

/// Validated, immutable agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub dump_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub file_filter: FileMatcher,
    pub file_wait_time: Duration,
    pub api_url: String,
    pub api_token: String,
    pub days_to_archive: u32,
    pub node_name: String,
    /// Size ceiling in bytes
    pub max_file_size: u64,
    pub aliases: HashMap<String, String>,
    pub bucket_prefix: String,
    pub log_level: String,
    pub consul_host: String,
    pub consul_service_name: String,
    pub exporter_bind_address: String,
    pub exporter_bind_port: u16,
    pub scan_interval: Duration,
    pub quiet_period: Duration,
    pub metrics_interval: Duration,
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// `overrides` are `(key, value)` pairs coming from the command line and
    /// win over every other source.
    pub fn load<'a, I>(file: Option<&Path>, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        Self::load_with_env(file, None, overrides)
    }

    /// Like [`Config::load`], reading `DUMPBEAT_*` values from `env`
    /// instead of the process environment when given.
    ///
    /// Environment values are kept as strings: a token such as `007700`
    /// must reach the API unchanged. Numeric fields are still converted when
    /// [`Settings`] is deserialized.
    pub fn load_with_env<'a, I>(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
        overrides: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let mut builder = config::Config::builder()
            .set_default("dump_dir", "/dumps")
            .and_then(|b| b.set_default("backup_dir", "/backup-dumps"))
            .and_then(|b| b.set_default("pattern_file_filter", "*.txt"))
            .and_then(|b| b.set_default("file_wait_time", 900i64))
            .and_then(|b| b.set_default("api_url", ""))
            .and_then(|b| b.set_default("api_token", ""))
            .and_then(|b| b.set_default("days_to_archive", 2i64))
            .and_then(|b| b.set_default("node_name", ""))
            .and_then(|b| b.set_default("max_file_size", 15i64))
            .and_then(|b| b.set_default("aliases", ""))
            .and_then(|b| b.set_default("bucket_prefix", "dumps"))
            .and_then(|b| b.set_default("log_level", "info"))
            .and_then(|b| b.set_default("consul_host", "127.0.0.1:8500"))
            .and_then(|b| b.set_default("consul_service_name", "dumpbeat"))
            .and_then(|b| b.set_default("exporter_bind_address", ""))
            .and_then(|b| b.set_default("exporter_bind_port", 9888i64))
            .and_then(|b| b.set_default("scan_interval", 120i64))
            .and_then(|b| b.set_default("quiet_period", 5i64))
            .and_then(|b| b.set_default("metrics_interval", 60i64))
            .map_err(config_error)?;

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).source(env));

        for (key, value) in overrides {
            builder = builder.set_override(key, value).map_err(config_error)?;
        }

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        Self::from_settings(settings)
    }

    /// Validate raw settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        if settings.api_url.trim().is_empty() {
            return Err(AgentError::Config("api_url must be set".to_string()));
        }

        match std::fs::metadata(&settings.dump_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(AgentError::Config(format!(
                    "dump_dir {} is not a directory",
                    settings.dump_dir.display()
                )))
            }
            Err(e) => {
                return Err(AgentError::Config(format!(
                    "dump_dir {} is unusable: {}",
                    settings.dump_dir.display(),
                    e
                )))
            }
        }

        if settings.exporter_bind_port < 1000 {
            return Err(AgentError::Config(format!(
                "expected exporter port range 1000-65535, given {}",
                settings.exporter_bind_port
            )));
        }

        if settings.scan_interval == 0 || settings.quiet_period == 0 || settings.metrics_interval == 0 {
            return Err(AgentError::Config("intervals must be greater than zero".to_string()));
        }

        let file_filter = FileMatcher::new(&settings.pattern_file_filter)?;

        let node_name = if settings.node_name.is_empty() {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| {
                    tracing::error!("Cannot read hostname, node name falls back to 'unknown'");
                    "unknown".to_string()
                })
        } else {
            settings.node_name
        };

        Ok(Config {
            dump_dir: settings.dump_dir,
            backup_dir: settings.backup_dir,
            file_filter,
            file_wait_time: Duration::from_secs(settings.file_wait_time),
            api_url: settings.api_url,
            api_token: settings.api_token,
            days_to_archive: settings.days_to_archive,
            node_name,
            max_file_size: settings.max_file_size.saturating_mul(BYTES_PER_MB),
            aliases: parse_aliases(&settings.aliases),
            bucket_prefix: settings.bucket_prefix,
            log_level: settings.log_level,
            consul_host: settings.consul_host,
            consul_service_name: settings.consul_service_name,
            exporter_bind_address: settings.exporter_bind_address,
            exporter_bind_port: settings.exporter_bind_port,
            scan_interval: Duration::from_secs(settings.scan_interval),
            quiet_period: Duration::from_secs(settings.quiet_period),
            metrics_interval: Duration::from_secs(settings.metrics_interval),
        })
    }
}

/// Parse `app:alias,app2:alias2`; malformed pairs are skipped.
pub fn parse_aliases(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let parts: Vec<&str> = pair.split(':').collect();
            match parts.as_slice() {
                [app, alias] if !app.trim().is_empty() => {
                    Some((app.trim().to_string(), alias.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect()
}

fn config_error(e: config::ConfigError) -> AgentError {
    AgentError::Config(e.to_string())
}

#[cfg(test)]
pub(crate) fn test_config(dump_dir: &Path, backup_dir: &Path, api_url: &str) -> Config {
    Config {
        dump_dir: dump_dir.to_path_buf(),
        backup_dir: backup_dir.to_path_buf(),
        file_filter: FileMatcher::new("*.txt").unwrap(),
        file_wait_time: Duration::from_secs(900),
        api_url: api_url.to_string(),
        api_token: "secret".to_string(),
        days_to_archive: 2,
        node_name: "node-1".to_string(),
        max_file_size: 15 * BYTES_PER_MB,
        aliases: HashMap::new(),
        bucket_prefix: "dumps".to_string(),
        log_level: "info".to_string(),
        consul_host: String::new(),
        consul_service_name: "dumpbeat".to_string(),
        exporter_bind_address: String::new(),
        exporter_bind_port: 9888,
        scan_interval: Duration::from_secs(120),
        quiet_period: Duration::from_secs(5),
        metrics_interval: Duration::from_secs(60),
    }
}
