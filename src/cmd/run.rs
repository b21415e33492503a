// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Full backup run.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{BackupOrchestrator, RunContext, RunSummary};
use crate::repo::{ContainerOps, RepositoryOps, discover};

/// Main handler for the run command.
///
/// # Errors
///
/// Returns an error if the container check fails or the repository root is
/// missing. Failures of single repositories only show up in the summary.
pub async fn run_backup_command(config: Arc<Config>) -> Result<RunSummary> {
    let ops = ContainerOps::new(&config.gitea).with_timeout(config.advanced.command_timeout());
    if config.advanced.verify_docker {
        ops.verify()
            .await
            .context("git server container is not available")?;
    }

    let repos_dir = config.repos_dir();
    if !repos_dir.is_dir() {
        bail!("repository directory does not exist: {}", repos_dir.display());
    }
    let repos = discover(&repos_dir)?;

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, finishing the current repositories...");
            signal_token.cancel();
        }
    });

    let ctx = Arc::new(RunContext::new(config, cancel_token));
    let ops: Arc<dyn RepositoryOps> = Arc::new(ops);
    let summary = BackupOrchestrator::new(ctx, ops).run_once(repos).await;

    if let Some(report) = &summary.report {
        println!("{}", report.display());
    }
    Ok(summary)
}
