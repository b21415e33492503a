// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Runs the per-repository pipeline over every eligible repository.
//!
//! ```text
//! run_once(repos)
//!   for each repo (sequential, or up to N at once behind a semaphore)
//!     cancelled?  -> stop starting new repositories
//!     eligible?   -> organization allow-list, optional mirror check
//!     pipeline    -> snapshot -> detect/protect -> retention -> archive
//!     failure     -> logged, counted, next repository
//!   join
//!   report (exactly once) -> report cleanup
//! ```

mod pipeline;


use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::GuardError;
use crate::layout::BackupLayout;
use crate::report::{ReportGenerator, collect_states};
use crate::repo::{Repository, RepositoryOps};
use crate::retention::{PruneStats, days_ago, prune_reports};
use crate::review::ReviewQueue;

pub use pipeline::{RepoOutcome, SkipReason};

/// Shared state of one run, built once and handed to every component.
#[derive(Debug)]
pub struct RunContext {
    config: Arc<Config>,
    layout: BackupLayout,
    queue: ReviewQueue,
    cancel_token: CancellationToken,
    started_at: DateTime<Local>,
}

impl RunContext {
    #[must_use]
    pub fn new(config: Arc<Config>, cancel_token: CancellationToken) -> Self {
        let layout = BackupLayout::from_config(&config);
        let queue = ReviewQueue::new(layout.review_queue());
        Self {
            config,
            layout,
            queue,
            cancel_token,
            started_at: Local::now(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<Config> {
        &self.config
    }

    #[must_use]
    pub const fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    #[must_use]
    pub const fn queue(&self) -> &ReviewQueue {
        &self.queue
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Writes a report of the current backup tree and drains the review queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the report file cannot be written.
    pub async fn generate_report(
        &self,
        summary: Option<&RunSummary>,
    ) -> crate::error::Result<crate::report::Report> {
        let layout = self.layout.clone();
        let states = tokio::task::spawn_blocking(move || collect_states(&layout))
            .await
            .map_err(|e| anyhow::anyhow!("report collection panicked: {e}"))?;
        ReportGenerator::new(
            &self.layout,
            &self.queue,
            self.config.alerts.alert_history_lines,
            self.config.backup.retention.reports_days,
        )
        .generate(&states, summary, Local::now())
        .await
    }

    /// Removes reports older than the report retention window.
    #[must_use]
    pub fn prune_reports(&self) -> PruneStats {
        prune_reports(
            self.layout.reports_dir(),
            days_ago(SystemTime::now(), self.config.backup.retention.reports_days),
        )
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub anomalies: usize,
    /// The run stopped early on an interrupt.
    pub cancelled: bool,
    /// Report written at the end of the run.
    pub report: Option<PathBuf>,
}

impl RunSummary {
    fn record(&mut self, outcome: &RepoOutcome) {
        match outcome {
            RepoOutcome::Processed { anomaly } => {
                self.processed += 1;
                if *anomaly {
                    self.anomalies += 1;
                }
            }
            RepoOutcome::Skipped(_) => self.skipped += 1,
            RepoOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Sequences the engine components over a list of repositories.
#[derive(Clone)]
pub struct BackupOrchestrator {
    ctx: Arc<RunContext>,
    ops: Arc<dyn RepositoryOps>,
}

impl BackupOrchestrator {
    #[must_use]
    pub fn new(ctx: Arc<RunContext>, ops: Arc<dyn RepositoryOps>) -> Self {
        Self { ctx, ops }
    }

    #[must_use]
    pub const fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Processes `repos`, then writes the run report and prunes old reports.
    ///
    /// Never fails: repository failures are counted, and a report that
    /// cannot be written is logged.
    pub async fn run_once(&self, repos: Vec<Repository>) -> RunSummary {
        let workers = self.ctx.config.advanced.workers();
        info!(repositories = repos.len(), workers, "backup run started");

        let mut summary = if workers > 1 {
            self.run_parallel(repos, workers).await
        } else {
            self.run_sequential(repos).await
        };

        match self.ctx.generate_report(Some(&summary)).await {
            Ok(report) => summary.report = Some(report.path().to_path_buf()),
            Err(e) => error!(error = %format!("{e:#}"), "failed to write report"),
        }
        let _ = self.ctx.prune_reports();

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            anomalies = summary.anomalies,
            cancelled = summary.cancelled,
            "backup run finished"
        );
        summary
    }

    async fn run_sequential(&self, repos: Vec<Repository>) -> RunSummary {
        let mut summary = RunSummary::default();
        for repo in repos {
            if self.ctx.cancel_token.is_cancelled() {
                warn!("interrupted, not starting further repositories");
                summary.cancelled = true;
                break;
            }
            let outcome = self.process(&repo).await;
            summary.record(&outcome);
        }
        summary
    }

    async fn run_parallel(&self, repos: Vec<Repository>, workers: usize) -> RunSummary {
        let mut summary = RunSummary::default();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        for repo in repos {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.ctx.cancel_token.is_cancelled() {
                warn!("interrupted, not starting further repositories");
                summary.cancelled = true;
                break;
            }
            let this = self.clone();
            set.spawn(async move {
                let _permit = permit;
                this.process(&repo).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!(error = %e, "repository pipeline panicked");
                    summary.record(&RepoOutcome::Failed(GuardError::Other(
                        e.to_string().into_boxed_str(),
                    )));
                }
            }
        }
        summary
    }
}
