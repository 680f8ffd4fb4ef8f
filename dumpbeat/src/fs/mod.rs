//! File system helpers shared by the scanner, watcher and archiver.

pub mod cleanup;
pub mod loader;
pub mod matcher;
pub mod metadata;
pub mod relocate;
pub mod walker;
