// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! On-disk layout of the backup tree.
//!
//! External tooling reads this layout, so names here are a stable contract.
//!
//! ```text
//! <root>/<owner>/<repo>/
//!   snapshots/<YYYYMMDD-HHMMSS>/            hardlinked tree
//!   snapshots/<id>/.snapshot_meta           written last
//!   snapshots/<id>/.protected               presence = protected
//!   archives/archive-<YYYYMM>.bundle
//!   .commit_tracking  .size_tracking  .alerts
//! <root>/.need_review[.claimed]            pending / held by a report
//! <root>/reports/report-<YYYYMMDD-HHMMSS>.md[.protected]
//! <root>/latest-report.md                   symlink to the newest report
//! ```


use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::repo::RepositoryIdentity;

pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const ARCHIVES_DIR: &str = "archives";
pub const SNAPSHOT_META_FILE: &str = ".snapshot_meta";
pub const PROTECTED_MARKER: &str = ".protected";
pub const PROTECTED_SUFFIX: &str = ".protected";
pub const COMMIT_TRACKING_FILE: &str = ".commit_tracking";
pub const SIZE_TRACKING_FILE: &str = ".size_tracking";
pub const ALERTS_FILE: &str = ".alerts";
pub const REVIEW_QUEUE_FILE: &str = ".need_review";

/// Paths of the whole backup tree.
#[derive(Debug, Clone)]
pub struct BackupLayout {
    root: PathBuf,
    reports_dir: PathBuf,
    latest_link: PathBuf,
}

impl BackupLayout {
    /// Layout with the default report placement.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            reports_dir: root.join("reports"),
            latest_link: root.join("latest-report.md"),
            root,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let root = config.backup.root.clone();
        Self {
            reports_dir: root.join(&config.reports.directory),
            latest_link: root.join(&config.reports.latest_link),
            root,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn review_queue(&self) -> PathBuf {
        self.root.join(REVIEW_QUEUE_FILE)
    }

    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    #[must_use]
    pub fn latest_link(&self) -> &Path {
        &self.latest_link
    }

    /// Paths for one repository.
    #[must_use]
    pub fn repo(&self, identity: &RepositoryIdentity) -> RepoPaths {
        RepoPaths::new(self.root.join(identity.owner()).join(identity.name()))
    }

    /// Every `<owner>/<repo>` directory that holds backup state, sorted.
    ///
    /// Reports and other top-level entries are skipped; a directory counts
    /// as a repository if it has a `snapshots/` or `archives/` child or a
    /// tracking file.
    #[must_use]
    pub fn backed_up_repositories(&self) -> Vec<RepositoryIdentity> {
        let mut found = Vec::new();
        for owner in sorted_subdirs(&self.root) {
            let Some(owner_name) = file_name(&owner) else {
                continue;
            };
            if owner_name.starts_with('.') || owner == self.reports_dir {
                continue;
            }
            for repo in sorted_subdirs(&owner) {
                let Some(repo_name) = file_name(&repo) else {
                    continue;
                };
                let paths = RepoPaths::new(repo.clone());
                if paths.snapshots().is_dir()
                    || paths.archives().is_dir()
                    || paths.commit_tracking().is_file()
                {
                    found.push(RepositoryIdentity::new(owner_name.clone(), repo_name));
                }
            }
        }
        found
    }
}

/// Paths for one repository's backup state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    base: PathBuf,
}

impl RepoPaths {
    pub(crate) const fn new(base: PathBuf) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn snapshots(&self) -> PathBuf {
        self.base.join(SNAPSHOTS_DIR)
    }

    #[must_use]
    pub fn archives(&self) -> PathBuf {
        self.base.join(ARCHIVES_DIR)
    }

    #[must_use]
    pub fn commit_tracking(&self) -> PathBuf {
        self.base.join(COMMIT_TRACKING_FILE)
    }

    #[must_use]
    pub fn size_tracking(&self) -> PathBuf {
        self.base.join(SIZE_TRACKING_FILE)
    }

    #[must_use]
    pub fn alerts(&self) -> PathBuf {
        self.base.join(ALERTS_FILE)
    }
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
}
