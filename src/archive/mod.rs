// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Monthly full-history bundles.
//!
//! ```text
//! archives/.archive-XXXX.partial   <- ops.export_bundle   (hidden, temp)
//!          |  persist (rename) on success, deleted on drop otherwise
//!          v
//! archives/archive-YYYYMM.bundle
//! ```
//!
//! At most one bundle exists per month. The temporary name never matches
//! the archive glob, so retention and reports cannot see a half-written
//! bundle.


use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use tracing::{debug, info};

use crate::error::ArchiveError;
use crate::layout::RepoPaths;
use crate::repo::{Repository, RepositoryOps};
use crate::retention::ARCHIVE_GLOB;
use crate::utility::fs::copy::publish_mode;
use crate::utility::fs::walk::find_files;

/// A calendar month, rendered `YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    #[must_use]
    pub fn of(date: &impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYYMM`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() != 6 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = text[..4].parse().ok()?;
        let month = text[4..].parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// `archive-YYYYMM.bundle`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("archive-{self}.bundle")
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// What [`ArchiveManager::ensure_monthly_archive`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The month already had a bundle.
    Present(PathBuf),
    /// A new bundle was written.
    Created(PathBuf),
}

/// Monthly bundles of one repository.
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    dir: PathBuf,
    archive_day: u32,
}

impl ArchiveManager {
    /// `archive_day` is the first day of the month on which a bundle is due.
    #[must_use]
    pub fn new(paths: &RepoPaths, archive_day: u32) -> Self {
        Self {
            dir: paths.archives(),
            archive_day,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn archive_path(&self, key: MonthKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    #[must_use]
    pub fn exists(&self, key: MonthKey) -> bool {
        self.archive_path(key).is_file()
    }

    /// True once `today` reaches the archive day and the month has no bundle.
    #[must_use]
    pub fn is_due(&self, today: &impl Datelike) -> bool {
        today.day() >= self.archive_day && !self.exists(MonthKey::of(today))
    }

    /// Finished bundles, oldest month first.
    #[must_use]
    pub fn list(&self) -> Vec<(MonthKey, PathBuf)> {
        if !self.dir.is_dir() {
            return Vec::new();
        }
        let mut archives: Vec<(MonthKey, PathBuf)> = find_files(&self.dir, ARCHIVE_GLOB)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_name()?.to_str()?;
                let key = stem
                    .strip_prefix("archive-")?
                    .strip_suffix(".bundle")
                    .and_then(MonthKey::parse)?;
                Some((key, path))
            })
            .collect();
        archives.sort();
        archives
    }

    /// Writes the bundle for `key` unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the export or the final rename fails. No
    /// partial file is left behind in either case.
    pub async fn ensure_monthly_archive(
        &self,
        repo: &Repository,
        ops: &dyn RepositoryOps,
        key: MonthKey,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let target = self.archive_path(key);
        if target.is_file() {
            debug!(repo = %repo.identity(), month = %key, "archive already present");
            return Ok(ArchiveOutcome::Present(target));
        }

        let persist_failed = |source: std::io::Error| ArchiveError::PersistFailed {
            path: target.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(persist_failed)?;
        let partial = tempfile::Builder::new()
            .prefix(".archive-")
            .suffix(".partial")
            .tempfile_in(&self.dir)
            .map_err(persist_failed)?;

        ops.export_bundle(repo, partial.path())
            .await
            .map_err(|source| ArchiveError::ExportFailed {
                repo: repo.identity().full_name(),
                source,
            })?;

        publish_mode(partial.path()).map_err(persist_failed)?;
        partial
            .persist(&target)
            .map_err(|e| persist_failed(e.error))?;

        info!(repo = %repo.identity(), archive = %target.display(), "monthly archive created");
        Ok(ArchiveOutcome::Created(target))
    }
}
