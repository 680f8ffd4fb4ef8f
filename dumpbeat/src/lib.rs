//! Dumpbeat
//!
//! Agent that ships dump files to a collection API, moves them into a backup
//! tree and archives aged backups into daily tarballs.

pub mod api;
pub mod archive;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod dump;
pub mod fs;
pub mod metrics;
pub mod registry;
pub mod scanner;
pub mod utils;
pub mod version;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{AgentError, Result};
