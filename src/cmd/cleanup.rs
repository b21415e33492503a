// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Report cleanup command.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::orchestrator::RunContext;
use crate::retention::PruneStats;

/// Removes expired, unprotected reports.
pub fn run_cleanup_command(config: Arc<Config>) -> PruneStats {
    let ctx = RunContext::new(config, CancellationToken::new());
    let stats = ctx.prune_reports();
    println!(
        "Reports deleted: {}, protected: {}, failed: {}",
        stats.deleted, stats.protected, stats.failed
    );
    stats
}
