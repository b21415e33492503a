// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Report-only command.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::RunContext;
use crate::report::Report;

/// Writes a report of the backup tree as it is now, without a run summary.
///
/// # Errors
///
/// Returns an error if the report cannot be written.
pub async fn run_report_command(config: Arc<Config>) -> Result<Report> {
    let ctx = RunContext::new(config, CancellationToken::new());
    let report = ctx.generate_report(None).await?;
    println!("{}", report.path().display());
    if report.is_protected() {
        for identity in report.reviewed() {
            println!("  needs review: {identity}");
        }
    }
    Ok(report)
}
