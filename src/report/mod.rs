// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! One Markdown report per run.
//!
//! ```text
//! collect_states()  --> Vec<RepositoryState>   (walks the backup tree)
//!        |
//!        v
//! generate()
//!   1. claim review queue     -> "Needs attention" or "All clear"
//!   2. render, write reports/report-<ts>.md   (temp file + rename)
//!   3. claimed entries?  -> report-<ts>.md.protected, then settle the claim
//!      (marker failed: claim kept, listed again by the next report)
//!   4. latest-report.md  -> symlink swapped in by rename, always last
//! ```

pub mod render;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::archive::ArchiveManager;
use crate::core::process::builder::{ProcessBuilder, ProcessFlags};
use crate::detect::alert_tail;
use crate::error::Result;
use crate::layout::{BackupLayout, RepoPaths};
use crate::orchestrator::RunSummary;
use crate::protect::{self, ProtectTarget};
use crate::repo::RepositoryIdentity;
use crate::review::ReviewQueue;
use crate::snapshot::{SNAPSHOT_ID_FORMAT, SnapshotStore};
use crate::tracking::TrackingLedger;
use crate::utility::fs::copy::publish_mode;
use crate::utility::fs::walk::directory_size_kb;

use self::render::{ReportContent, render};

/// Alert lines that mark a commit regression.
const COMMIT_ALERT_PREFIX: &str = "Commit count dropped";

/// Backup state of one repository as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    identity: RepositoryIdentity,
    commit_count: Option<u64>,
    size_kb: Option<u64>,
    backup_size_kb: u64,
    snapshots: usize,
    protected_snapshots: Vec<String>,
    latest_snapshot: Option<String>,
    archives: usize,
    last_commit_alert: Option<String>,
}

impl RepositoryState {
    /// Reads the state of `identity` from the backup tree.
    #[must_use]
    pub fn collect(layout: &BackupLayout, identity: &RepositoryIdentity) -> Self {
        let paths = layout.repo(identity);
        let store = SnapshotStore::new(&paths);
        let snapshots = store.enumerate();
        let record = TrackingLedger::new(&paths).load();

        Self {
            identity: identity.clone(),
            commit_count: record.map(|r| r.commit_count()),
            size_kb: record.and_then(|r| r.size_kb()),
            backup_size_kb: directory_size_kb(paths.base()).unwrap_or(0),
            protected_snapshots: snapshots
                .iter()
                .filter(|s| s.is_protected())
                .map(|s| s.id().to_string())
                .collect(),
            latest_snapshot: store.latest().map(|s| s.id().to_string()),
            snapshots: snapshots.len(),
            archives: ArchiveManager::new(&paths, 1).list().len(),
            last_commit_alert: last_commit_alert(&paths),
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    /// Last tracked commit count.
    #[must_use]
    pub const fn commit_count(&self) -> Option<u64> {
        self.commit_count
    }

    #[must_use]
    pub const fn snapshots(&self) -> usize {
        self.snapshots
    }

    /// Ids of protected snapshots, newest first.
    #[must_use]
    pub fn protected_snapshots(&self) -> &[String] {
        &self.protected_snapshots
    }

    #[must_use]
    pub const fn archives(&self) -> usize {
        self.archives
    }

    /// Most recent commit-regression line of the alert log.
    #[must_use]
    pub fn last_commit_alert(&self) -> Option<&str> {
        self.last_commit_alert.as_deref()
    }
}

fn last_commit_alert(paths: &RepoPaths) -> Option<String> {
    let text = std::fs::read_to_string(paths.alerts()).ok()?;
    text.lines()
        .rev()
        .find(|line| line.starts_with(COMMIT_ALERT_PREFIX))
        .map(String::from)
}

/// States of every repository in the backup tree, sorted by name.
#[must_use]
pub fn collect_states(layout: &BackupLayout) -> Vec<RepositoryState> {
    layout
        .backed_up_repositories()
        .iter()
        .map(|identity| RepositoryState::collect(layout, identity))
        .collect()
}

/// A queued repository as shown under "Needs attention".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attention {
    identity: RepositoryIdentity,
    alert_tail: Vec<String>,
    commit_count: Option<u64>,
    size_kb: Option<u64>,
    latest_snapshot: Option<String>,
    protected_snapshots: Vec<String>,
}

impl Attention {
    fn new(
        identity: RepositoryIdentity,
        layout: &BackupLayout,
        states: &[RepositoryState],
        alert_lines: usize,
    ) -> Self {
        let state = states
            .iter()
            .find(|s| s.identity == identity)
            .cloned()
            .unwrap_or_else(|| RepositoryState::collect(layout, &identity));
        Self {
            alert_tail: alert_tail(&layout.repo(&identity).alerts(), alert_lines),
            commit_count: state.commit_count,
            size_kb: state.size_kb,
            latest_snapshot: state.latest_snapshot,
            protected_snapshots: state.protected_snapshots,
            identity,
        }
    }
}

/// Usage of the filesystem holding the backups, from `df -Pk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    filesystem: String,
    total_kb: u64,
    used_kb: u64,
    available_kb: u64,
    capacity: String,
}

impl DiskUsage {
    /// Parses POSIX `df -Pk` output.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let line = output.lines().nth(1)?;
        let mut fields = line.split_whitespace();
        Some(Self {
            filesystem: fields.next()?.to_string(),
            total_kb: fields.next()?.parse().ok()?,
            used_kb: fields.next()?.parse().ok()?,
            available_kb: fields.next()?.parse().ok()?,
            capacity: fields.next()?.to_string(),
        })
    }

    /// Best effort; `None` if `df` is missing or fails.
    pub async fn query(path: &Path) -> Option<Self> {
        if !ProcessBuilder::exists("df") {
            return None;
        }
        let output = ProcessBuilder::new("df")
            .arg("-Pk")
            .arg(path)
            .capture_output()
            .flag(ProcessFlags::IGNORE_OUTPUT_ON_FAILURE)
            .run()
            .await;
        match output {
            Ok(output) => Self::parse(output.stdout()),
            Err(e) => {
                debug!(error = %e, "disk usage unavailable");
                None
            }
        }
    }
}

/// A written report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    path: PathBuf,
    protected: bool,
    reviewed: Vec<RepositoryIdentity>,
}

impl Report {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the report got a protection marker.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.protected
    }

    /// Repositories from the review queue listed in this report. They are
    /// only removed from the queue when the report is protected.
    #[must_use]
    pub fn reviewed(&self) -> &[RepositoryIdentity] {
        &self.reviewed
    }
}

/// Writes reports into the reports directory.
#[derive(Debug)]
pub struct ReportGenerator<'a> {
    layout: &'a BackupLayout,
    queue: &'a ReviewQueue,
    alert_lines: usize,
    reports_days: u32,
}

impl<'a> ReportGenerator<'a> {
    #[must_use]
    pub const fn new(
        layout: &'a BackupLayout,
        queue: &'a ReviewQueue,
        alert_lines: usize,
        reports_days: u32,
    ) -> Self {
        Self {
            layout,
            queue,
            alert_lines,
            reports_days,
        }
    }

    /// Writes the report for `states` and consumes the review queue.
    ///
    /// The queue is only consumed once the report carrying its entries is
    /// protected.
    ///
    /// # Errors
    ///
    /// Returns an error if the report file cannot be written. A failed
    /// marker, queue claim, or latest pointer is only logged.
    pub async fn generate(
        &self,
        states: &[RepositoryState],
        summary: Option<&RunSummary>,
        now: DateTime<Local>,
    ) -> Result<Report> {
        let dir = self.layout.reports_dir();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let (reviewed, claimed) = match self.queue.claim() {
            Ok(entries) => (entries, true),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to claim review queue");
                (self.queue.entries(), false)
            }
        };
        let attention: Vec<Attention> = reviewed
            .iter()
            .cloned()
            .map(|identity| Attention::new(identity, self.layout, states, self.alert_lines))
            .collect();
        let disk = DiskUsage::query(self.layout.root()).await;

        let path = unique_report_path(dir, now);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let latest_name = self
            .layout
            .latest_link()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = render(&ReportContent {
            generated_at: now,
            file_name: &file_name,
            states,
            attention: &attention,
            summary,
            disk: disk.as_ref(),
            reports_days: self.reports_days,
            latest_link: &latest_name,
        });
        write_atomically(dir, &path, &text)?;
        info!(report = %path.display(), repositories = states.len(), "report written");

        let protected = !reviewed.is_empty() && {
            let names: Vec<String> = reviewed.iter().map(RepositoryIdentity::full_name).collect();
            match protect::protect(ProtectTarget::Report(&path), &file_name, &names, now) {
                Ok(_) => true,
                Err(e) => {
                    warn!(
                        report = %path.display(),
                        error = %e,
                        "failed to protect report, review queue kept"
                    );
                    false
                }
            }
        };
        if claimed && (protected || reviewed.is_empty()) {
            match self.queue.settle() {
                Ok(()) if protected => {
                    info!(count = reviewed.len(), "review queue drained");
                }
                Ok(()) => {}
                Err(e) => warn!(error = %format!("{e:#}"), "failed to settle review queue"),
            }
        }

        if let Err(e) = update_latest_link(self.layout.latest_link(), &path) {
            warn!(link = %self.layout.latest_link().display(), error = %format!("{e:#}"), "failed to update latest report link");
        }

        Ok(Report {
            path,
            protected,
            reviewed,
        })
    }
}

fn unique_report_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format(SNAPSHOT_ID_FORMAT).to_string();
    let first = dir.join(format!("report-{stamp}.md"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("report-{stamp}-{n}.md")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn write_atomically(dir: &Path, path: &Path, text: &str) -> Result<()> {
    use std::io::Write;

    let mut partial = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".partial")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create a temporary report in {}", dir.display()))?;
    partial
        .write_all(text.as_bytes())
        .with_context(|| format!("failed to write {}", partial.path().display()))?;
    publish_mode(partial.path())
        .with_context(|| format!("failed to set mode of {}", partial.path().display()))?;
    partial
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}

/// Points `link` at `target` by renaming a fresh link over it.
///
/// The link is relative when `target` lives below the link's directory.
///
/// # Errors
///
/// Returns an error if the temporary link cannot be created or renamed.
pub fn update_latest_link(link: &Path, target: &Path) -> Result<()> {
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    let relative = target.strip_prefix(parent).unwrap_or(target);
    let staging = parent.join(format!(".latest-report.{}.tmp", std::process::id()));
    if staging.symlink_metadata().is_ok() {
        std::fs::remove_file(&staging)
            .with_context(|| format!("failed to remove stale {}", staging.display()))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(relative, &staging)
        .with_context(|| format!("failed to create link {}", staging.display()))?;
    #[cfg(not(unix))]
    {
        let _ = relative;
        std::fs::copy(target, &staging)
            .with_context(|| format!("failed to copy {}", target.display()))?;
    }

    std::fs::rename(&staging, link)
        .with_context(|| format!("failed to replace {}", link.display()))?;
    debug!(link = %link.display(), target = %relative.display(), "latest report updated");
    Ok(())
}
