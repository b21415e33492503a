// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::SystemTime;

use chrono::Local;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::BackupOrchestrator;
use crate::archive::{ArchiveManager, MonthKey};
use crate::detect::{AnomalyDetector, Observation};
use crate::error::{GuardError, GuardResult, Severity};
use crate::repo::Repository;
use crate::retention::{days_ago, months_ago, prune_archives, prune_snapshots};
use crate::snapshot::SnapshotStore;

/// Why a repository was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Owner not in `backup.organizations`.
    Organization,
    /// Not a mirror while `backup.check_mirror_only` is set.
    NotMirror,
    /// The mirror check itself failed.
    MirrorCheckFailed,
}

/// Result of one repository's pipeline.
#[derive(Debug)]
pub enum RepoOutcome {
    Processed { anomaly: bool },
    Skipped(SkipReason),
    Failed(GuardError),
}

impl BackupOrchestrator {
    /// Runs the pipeline for one repository. Never panics on repository
    /// errors; they come back as [`RepoOutcome::Failed`].
    pub async fn process(&self, repo: &Repository) -> RepoOutcome {
        let span = info_span!("repo", name = %repo.identity());
        async {
            if let Some(reason) = self.skip_reason(repo).await {
                debug!(?reason, "skipped");
                return RepoOutcome::Skipped(reason);
            }
            match self.pipeline(repo).await {
                Ok(anomaly) => RepoOutcome::Processed { anomaly },
                Err(e) => {
                    match e.severity() {
                        Severity::Warning => warn!(error = %e, "repository step failed"),
                        Severity::Repository | Severity::Run => {
                            error!(error = %e, timeout = e.is_timeout(), "repository pipeline aborted");
                        }
                    }
                    RepoOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn skip_reason(&self, repo: &Repository) -> Option<SkipReason> {
        let backup = &self.ctx.config.backup;
        if !backup.allows_owner(repo.identity().owner()) {
            return Some(SkipReason::Organization);
        }
        if !backup.check_mirror_only {
            return None;
        }
        match self.ops.is_mirror(repo).await {
            Ok(true) => None,
            Ok(false) => Some(SkipReason::NotMirror),
            Err(e) => {
                warn!(error = %e, "mirror check failed, skipping");
                Some(SkipReason::MirrorCheckFailed)
            }
        }
    }

    /// Snapshot, then detection, then retention, then the monthly archive.
    /// Returns whether an anomaly was detected.
    async fn pipeline(&self, repo: &Repository) -> GuardResult<bool> {
        let config = &self.ctx.config;
        let identity = repo.identity();
        let paths = self.ctx.layout.repo(identity);
        let store = SnapshotStore::new(&paths);
        let now = Local::now();

        let snapshot = store.create(repo, self.ops.as_ref(), now).await?;

        let size_kb = match self.ops.directory_size_kb(repo.path()).await {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(error = %e, "repository size unavailable");
                None
            }
        };
        let observation = Observation {
            commit_count: snapshot.commit_count(),
            size_kb,
        };

        let detector = AnomalyDetector::from_config(&config.alerts, &self.ctx.queue);
        let result = detector
            .evaluate(identity, &paths, &store, Some(&snapshot), observation, now)
            .map_err(|e| GuardError::Other(format!("{e:#}").into_boxed_str()))?;

        let _ = prune_snapshots(
            &store,
            days_ago(SystemTime::now(), config.backup.retention.snapshots_days),
            Some(snapshot.path()),
        );

        let archives = ArchiveManager::new(&paths, config.backup.archive_day);
        if archives.is_due(&now) {
            if let Err(e) = archives
                .ensure_monthly_archive(repo, self.ops.as_ref(), MonthKey::of(&now))
                .await
            {
                warn!(error = %e, "monthly archive failed");
            }
        }
        let _ = prune_archives(
            archives.dir(),
            months_ago(now, config.backup.retention.archives_months),
        );

        info!(
            snapshot = %snapshot.id(),
            anomaly = result.is_anomaly(),
            "repository processed"
        );
        Ok(result.is_anomaly())
    }
}
