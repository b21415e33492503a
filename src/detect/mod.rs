// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Regression detection between consecutive runs.
//!
//! ```text
//! previous TrackingRecord --+
//!                           +--> assess() --> AnomalyResult
//! current Observation ------+                      |
//!                                                  | anomaly?
//!                 +--------------------------------+
//!                 v
//!   .alerts  += timestamped block
//!   .need_review += repo
//!   previous snapshot  <-- .protected   (if escalation is on)
//!
//! tracking := current values, always
//! ```
//!
//! Percentages are whole numbers rounded down and must exceed the
//! threshold: with a 10% threshold, a drop of exactly 10% is not an anomaly.


use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::types::AlertsConfig;
use crate::error::Result;
use crate::layout::RepoPaths;
use crate::protect::{self, ProtectTarget};
use crate::repo::RepositoryIdentity;
use crate::review::ReviewQueue;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::tracking::{TrackingLedger, TrackingRecord};

/// Closing line of every alert block.
pub const POSSIBLE_CAUSE: &str = "Possible cause: force-push, branch deletion, or history rewrite";

/// Percentages above which a decrease is an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    commit_pct: u32,
    size_pct: u32,
}

impl Thresholds {
    #[must_use]
    pub const fn new(commit_pct: u32, size_pct: u32) -> Self {
        Self {
            commit_pct,
            size_pct,
        }
    }
}

impl From<&AlertsConfig> for Thresholds {
    fn from(alerts: &AlertsConfig) -> Self {
        Self::new(
            alerts.commit_decrease_threshold,
            alerts.size_decrease_threshold,
        )
    }
}

/// Values measured in this run. `None` means the query failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    pub commit_count: Option<u64>,
    pub size_kb: Option<u64>,
}

/// The metric that raised an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Commits,
    Size,
}

impl Metric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::Size => "size",
        }
    }
}

/// Whole-percent decrease from `previous` to `current`, rounded down.
///
/// `None` unless `current < previous`.
#[must_use]
pub fn decrease_pct(previous: u64, current: u64) -> Option<u64> {
    if current >= previous {
        return None;
    }
    let pct = u128::from(previous - current) * 100 / u128::from(previous);
    u64::try_from(pct).ok()
}

/// Outcome of comparing one run against the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnomalyResult {
    baseline: bool,
    commit_decrease_pct: Option<u64>,
    size_decrease_pct: Option<u64>,
    cause: Option<Metric>,
    messages: Vec<String>,
    protected_snapshot: Option<String>,
}

impl AnomalyResult {
    /// No previous record existed; nothing was compared.
    #[must_use]
    pub const fn is_baseline(&self) -> bool {
        self.baseline
    }

    #[must_use]
    pub const fn is_anomaly(&self) -> bool {
        self.cause.is_some()
    }

    /// The first metric that crossed its threshold, commits before size.
    #[must_use]
    pub const fn cause(&self) -> Option<Metric> {
        self.cause
    }

    /// Decrease of the metric that raised the anomaly.
    #[must_use]
    pub const fn primary_pct(&self) -> Option<u64> {
        match self.cause {
            Some(Metric::Commits) => self.commit_decrease_pct,
            Some(Metric::Size) => self.size_decrease_pct,
            None => None,
        }
    }

    /// Commit decrease, whether or not it crossed the threshold.
    #[must_use]
    pub const fn commit_decrease_pct(&self) -> Option<u64> {
        self.commit_decrease_pct
    }

    /// Size decrease, whether or not it crossed the threshold.
    #[must_use]
    pub const fn size_decrease_pct(&self) -> Option<u64> {
        self.size_decrease_pct
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Id of the snapshot that was protected because of this anomaly.
    #[must_use]
    pub fn protected_snapshot(&self) -> Option<&str> {
        self.protected_snapshot.as_deref()
    }
}

/// Compares `current` against `previous` without touching the disk.
///
/// Both metrics are always evaluated; an unknown value on either side skips
/// that metric.
#[must_use]
pub fn assess(
    previous: Option<TrackingRecord>,
    current: Observation,
    thresholds: Thresholds,
) -> AnomalyResult {
    let Some(previous) = previous else {
        return AnomalyResult {
            baseline: true,
            ..AnomalyResult::default()
        };
    };

    let mut result = AnomalyResult::default();

    if let Some(cur) = current.commit_count {
        let prev = previous.commit_count();
        result.commit_decrease_pct = decrease_pct(prev, cur);
        if let Some(pct) = result.commit_decrease_pct
            && pct > u64::from(thresholds.commit_pct)
        {
            result.cause = Some(Metric::Commits);
            result.messages.push(format!("Commit count dropped by {pct}%"));
            result
                .messages
                .push(format!("Previous: {prev} commits -> current: {cur} commits"));
        }
    }

    if let (Some(prev), Some(cur)) = (previous.size_kb(), current.size_kb) {
        result.size_decrease_pct = decrease_pct(prev, cur);
        if let Some(pct) = result.size_decrease_pct
            && pct > u64::from(thresholds.size_pct)
        {
            if result.cause.is_some() {
                result.messages.push(format!("Size also dropped by {pct}%"));
            } else {
                result.cause = Some(Metric::Size);
                result
                    .messages
                    .push(format!("Repository size dropped by {pct}%"));
            }
            result
                .messages
                .push(format!("Previous: {prev}KB -> current: {cur}KB"));
        }
    }

    result
}

/// Applies the threshold policy and its side effects for one repository.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector<'a> {
    thresholds: Thresholds,
    protect: bool,
    queue: &'a ReviewQueue,
}

impl<'a> AnomalyDetector<'a> {
    #[must_use]
    pub const fn new(thresholds: Thresholds, protect: bool, queue: &'a ReviewQueue) -> Self {
        Self {
            thresholds,
            protect,
            queue,
        }
    }

    #[must_use]
    pub fn from_config(alerts: &AlertsConfig, queue: &'a ReviewQueue) -> Self {
        Self::new(
            Thresholds::from(alerts),
            alerts.protect_abnormal_snapshots,
            queue,
        )
    }

    /// Compares `current` with the stored record, escalates an anomaly,
    /// then stores `current` as the new record.
    ///
    /// `created` is the snapshot taken earlier in this run; the snapshot
    /// before it is the one that gets protected. Failures of the alert log,
    /// queue or marker are logged and do not stop the evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tracking record cannot be written.
    pub fn evaluate(
        &self,
        repo: &RepositoryIdentity,
        paths: &RepoPaths,
        store: &SnapshotStore,
        created: Option<&Snapshot>,
        current: Observation,
        now: DateTime<Local>,
    ) -> Result<AnomalyResult> {
        let ledger = TrackingLedger::new(paths);
        let previous = ledger.load();
        let mut result = assess(previous, current, self.thresholds);

        if result.is_baseline() {
            info!(
                repo = %repo,
                commits = ?current.commit_count,
                size_kb = ?current.size_kb,
                "baseline recorded"
            );
        }

        if result.is_anomaly() {
            warn!(
                repo = %repo,
                cause = result.cause().map_or("", Metric::as_str),
                decrease_pct = ?result.primary_pct(),
                "anomaly detected"
            );
            if let Err(e) = append_alert(&paths.alerts(), now, result.messages()) {
                warn!(repo = %repo, error = %format!("{e:#}"), "failed to write alert log");
            }
            if let Err(e) = self.queue.enqueue(repo) {
                warn!(repo = %repo, error = %format!("{e:#}"), "failed to queue repository for review");
            }
            if self.protect {
                result.protected_snapshot = protect_previous(repo, store, created, &result, now);
            }
        }

        // Unknown values carry the previous ones forward.
        let commits = current
            .commit_count
            .or_else(|| previous.map(|p| p.commit_count()));
        let size_kb = current
            .size_kb
            .or_else(|| previous.and_then(|p| p.size_kb()));
        match commits {
            Some(commits) => ledger
                .save(TrackingRecord::new(commits, size_kb))
                .with_context(|| format!("failed to update tracking for {repo}"))?,
            None => warn!(repo = %repo, "commit count unknown on first run, no baseline stored"),
        }

        Ok(result)
    }
}

fn protect_previous(
    repo: &RepositoryIdentity,
    store: &SnapshotStore,
    created: Option<&Snapshot>,
    result: &AnomalyResult,
    now: DateTime<Local>,
) -> Option<String> {
    let Some(previous) = store.previous(created) else {
        warn!(repo = %repo, "no previous snapshot to protect");
        return None;
    };
    match protect::protect(
        ProtectTarget::Snapshot(previous.path()),
        &repo.full_name(),
        result.messages(),
        now,
    ) {
        Ok(_) => {
            info!(repo = %repo, snapshot = %previous.id(), "last known-good snapshot protected");
            Some(previous.id().to_string())
        }
        Err(e) => {
            warn!(repo = %repo, snapshot = %previous.id(), error = %e, "failed to protect snapshot");
            None
        }
    }
}

/// Appends one timestamped block to the alert log.
///
/// # Errors
///
/// Returns an error if the log cannot be opened or written.
pub fn append_alert(path: &Path, now: DateTime<Local>, messages: &[String]) -> Result<()> {
    let mut block = String::new();
    let _ = writeln!(block);
    let _ = writeln!(block, "[{}]", now.to_rfc3339());
    for message in messages {
        let _ = writeln!(block, "{message}");
    }
    let _ = writeln!(block, "{POSSIBLE_CAUSE}");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

/// The last `lines` non-empty lines of an alert log.
#[must_use]
pub fn alert_tail(path: &Path, lines: usize) -> Vec<String> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(lines)..]
        .iter()
        .map(|l| (*l).to_string())
        .collect()
}
