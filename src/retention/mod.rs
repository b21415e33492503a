// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Age-based cleanup that never touches protected items.
//!
//! ```text
//!               candidate
//!                   |
//!        protected? +--yes--> keep (counted)
//!                   |
//!   kept this run?  +--yes--> keep
//!                   |
//!   mtime < cutoff? +--no---> keep
//!                   |
//!                 delete  (failure: warn, next candidate)
//! ```
//!
//! Snapshots and reports use a window in days, archives a window in
//! calendar months.


use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, Months};
use tracing::{debug, info, warn};

use crate::protect::{self, ProtectTarget};
use crate::snapshot::SnapshotStore;
use crate::utility::fs::walk::find_files;

/// Glob of archive bundles inside `archives/`.
pub const ARCHIVE_GLOB: &str = "archive-*.bundle";

/// Glob of report files inside the reports directory.
pub const REPORT_GLOB: &str = "report-*.md";

/// Counters from one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub deleted: usize,
    pub protected: usize,
    pub failed: usize,
}

/// `now` minus `days` days.
#[must_use]
pub fn days_ago(now: SystemTime, days: u32) -> SystemTime {
    now.checked_sub(Duration::from_secs(u64::from(days) * 86_400))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// `now` minus `months` calendar months.
#[must_use]
pub fn months_ago(now: DateTime<Local>, months: u32) -> SystemTime {
    now.checked_sub_months(Months::new(months))
        .map_or(SystemTime::UNIX_EPOCH, SystemTime::from)
}

/// Removes snapshots last modified before `cutoff`.
///
/// `keep` is the snapshot created in this run; it survives whatever its age.
#[must_use]
pub fn prune_snapshots(store: &SnapshotStore, cutoff: SystemTime, keep: Option<&Path>) -> PruneStats {
    let mut stats = PruneStats::default();
    for snapshot in store.enumerate() {
        if snapshot.is_protected() {
            stats.protected += 1;
            continue;
        }
        if keep.is_some_and(|k| k == snapshot.path()) || snapshot.modified() >= cutoff {
            continue;
        }
        match std::fs::remove_dir_all(snapshot.path()) {
            Ok(()) => {
                debug!(snapshot = %snapshot.path().display(), "old snapshot removed");
                stats.deleted += 1;
            }
            Err(e) => {
                warn!(snapshot = %snapshot.path().display(), error = %e, "failed to remove old snapshot");
                stats.failed += 1;
            }
        }
    }
    log_stats("snapshots", store.root(), stats);
    stats
}

/// Removes `archive-*.bundle` files in `dir` last modified before `cutoff`.
#[must_use]
pub fn prune_archives(dir: &Path, cutoff: SystemTime) -> PruneStats {
    let stats = prune_files(dir, ARCHIVE_GLOB, cutoff, |file| {
        protect::is_protected(ProtectTarget::Archive(file))
    });
    log_stats("archives", dir, stats);
    stats
}

/// Removes `report-*.md` files in `dir` last modified before `cutoff`.
#[must_use]
pub fn prune_reports(dir: &Path, cutoff: SystemTime) -> PruneStats {
    let stats = prune_files(dir, REPORT_GLOB, cutoff, |file| {
        protect::is_protected(ProtectTarget::Report(file))
    });
    log_stats("reports", dir, stats);
    stats
}

fn prune_files(
    dir: &Path,
    pattern: &str,
    cutoff: SystemTime,
    is_protected: impl Fn(&Path) -> bool,
) -> PruneStats {
    let mut stats = PruneStats::default();
    if !dir.is_dir() {
        return stats;
    }
    let files: Vec<PathBuf> = match find_files(dir, pattern) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %format!("{e:#}"), "failed to list files for cleanup");
            return stats;
        }
    };

    for file in files {
        if is_protected(&file) {
            stats.protected += 1;
            continue;
        }
        let Ok(modified) = std::fs::metadata(&file).and_then(|m| m.modified()) else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }
        match std::fs::remove_file(&file) {
            Ok(()) => {
                debug!(file = %file.display(), "old file removed");
                stats.deleted += 1;
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "failed to remove old file");
                stats.failed += 1;
            }
        }
    }
    stats
}

fn log_stats(kind: &str, dir: &Path, stats: PruneStats) {
    if stats.deleted > 0 || stats.failed > 0 {
        info!(kind, dir = %dir.display(), deleted = stats.deleted, failed = stats.failed, "cleanup finished");
    }
    if stats.protected > 0 {
        debug!(kind, dir = %dir.display(), protected = stats.protected, "protected items kept");
    }
}
