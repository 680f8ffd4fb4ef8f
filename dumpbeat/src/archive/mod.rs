//! Daily archiving of the backup tree.
//!
//! Backup files whose modification day lies more than `days_to_archive`
//! calendar days in the past are grouped by that day and packed into
//! `<backup_dir>/<YYYY-MM-DD>.tar.gz`. Day arithmetic works on local
//! calendar dates, so a file written at 23:59 and one written at 00:01 the
//! next morning are always one day apart.

pub mod tarball;

use crate::config::Config;
use crate::fs::cleanup::cleanup_empty_dirs;
use crate::fs::matcher::FileMatcher;
use crate::fs::walker::walk_files;
use crate::utils::errors::Result;
use chrono::{DateTime, Local, NaiveDate};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Backup files per modification day, `YYYY-MM-DD` keys in date order.
pub type ArchiveGroups = BTreeMap<String, Vec<PathBuf>>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Tarballs written
    pub archives: usize,
    pub files_archived: usize,
    pub failed_groups: usize,
    pub dirs_removed: usize,
}

#[derive(Debug, Clone)]
pub struct Archiver {
    backup_dir: PathBuf,
    filter: FileMatcher,
    days_to_archive: u32,
}

impl Archiver {
    pub fn new(backup_dir: PathBuf, filter: FileMatcher, days_to_archive: u32) -> Self {
        Self {
            backup_dir,
            filter,
            days_to_archive,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.backup_dir.clone(),
            config.file_filter.clone(),
            config.days_to_archive,
        )
    }

    /// Run one archiving pass relative to the current local date.
    pub fn archive(&self) -> Result<ArchiveReport> {
        self.archive_at(Local::now().date_naive())
    }

    /// Run one archiving pass as if today were `today`.
    ///
    /// A failing day is logged and left in place for the next pass; only a
    /// backup root that cannot be created or read is an error.
    pub fn archive_at(&self, today: NaiveDate) -> Result<ArchiveReport> {
        std::fs::create_dir_all(&self.backup_dir)?;

        let groups = self.group_files(today)?;
        let mut report = ArchiveReport::default();

        for (day, files) in &groups {
            let dest = tarball::tarball_path(&self.backup_dir, day);
            match tarball::write_tarball(&dest, files) {
                Ok(count) => {
                    info!("Archived {} files into {}", count, dest.display());
                    report.archives += 1;
                    report.files_archived += count;
                }
                Err(e) => {
                    error!("Error archiving {}: {}", day, e);
                    report.failed_groups += 1;
                }
            }
        }

        report.dirs_removed = cleanup_empty_dirs(&self.backup_dir);
        Ok(report)
    }

    /// Group the files old enough to be archived on `today`.
    pub fn group_files(&self, today: NaiveDate) -> Result<ArchiveGroups> {
        let mut groups = ArchiveGroups::new();

        walk_files(&self.backup_dir, |file| {
            if is_archive(&file.path, &self.backup_dir) {
                return;
            }
            if !self.filter.matches_name(&file.file_name()) {
                return;
            }

            let modified: DateTime<Local> = file.modified.into();
            let day = modified.date_naive();
            if days_between(day, today) > i64::from(self.days_to_archive) {
                groups
                    .entry(day.format("%Y-%m-%d").to_string())
                    .or_default()
                    .push(file.path);
            }
        })?;

        for files in groups.values_mut() {
            files.sort();
        }

        Ok(groups)
    }
}

/// Whole calendar days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

fn is_archive(path: &Path, root: &Path) -> bool {
    path.parent() == Some(root)
        && path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(tarball::ARCHIVE_EXTENSION))
            .unwrap_or(false)
}
