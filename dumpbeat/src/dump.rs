//! The dump record sent to the collection API.

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path};

/// One file's content plus metadata, packaged for upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dump {
    /// File content (the first bytes only for oversized files)
    pub content: String,

    /// Absolute source path
    pub filename: String,

    /// Last modification time, seconds since Unix epoch
    #[serde(rename = "date_created_file")]
    pub created_at: i64,

    pub node_name: String,

    pub root_dir: String,

    pub file_size: u64,

    pub bucket_name: String,

    /// Time the dump was built for sending
    #[serde(rename = "date")]
    pub sent_at: DateTime<Utc>,
}

/// Bucket a dump belongs to: `<prefix>-<year>-<month>` of its modification time.
pub fn bucket_name(prefix: &str, modified: &DateTime<Local>) -> String {
    format!("{}-{}-{}", prefix, modified.year(), modified.month())
}

/// Application a dump belongs to: the first component of its path below `root`.
///
/// A file directly under the root is its own application.
pub fn app_name(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .find_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Apply the alias table to an application name.
pub fn resolve_alias(app: String, aliases: &HashMap<String, String>) -> String {
    match aliases.get(&app) {
        Some(alias) => alias.clone(),
        None => app,
    }
}
