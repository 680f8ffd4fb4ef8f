//! Logging configuration using tracing.

use crate::utils::errors::{AgentError, Result};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Check that `level` names a tracing level (trace, debug, info, warn, error).
pub fn parse_level(level: &str) -> Result<tracing::Level> {
    tracing::Level::from_str(level.trim())
        .map_err(|_| AgentError::Config(format!("invalid log level '{}'", level)))
}

/// Initialize logging with the specified level.
///
/// `RUST_LOG` takes precedence when set; otherwise the configured level is
/// used and must be valid.
pub fn init(level: &str) -> Result<()> {
    let level = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| AgentError::Config(format!("logger already initialized: {}", e)))?;

    Ok(())
}
