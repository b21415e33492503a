// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Markdown rendering. Pure; everything it prints is passed in.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use super::{Attention, DiskUsage, RepositoryState};
use crate::orchestrator::RunSummary;

/// Protected snapshots listed per repository before the rest is summarized.
const PROTECTED_LISTED: usize = 5;

/// Everything one report shows.
#[derive(Debug)]
pub struct ReportContent<'a> {
    pub generated_at: DateTime<Local>,
    pub file_name: &'a str,
    pub states: &'a [RepositoryState],
    pub attention: &'a [Attention],
    pub summary: Option<&'a RunSummary>,
    pub disk: Option<&'a DiskUsage>,
    pub reports_days: u32,
    pub latest_link: &'a str,
}

/// `1234567` -> `1,234,567`.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn mb(kb: u64) -> u64 {
    kb / 1024
}

fn or_na(value: Option<u64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Renders the whole report.
#[must_use]
pub fn render(content: &ReportContent<'_>) -> String {
    let mut out = String::new();
    let protected = !content.attention.is_empty();

    let _ = writeln!(out, "# Mirror Backup Report\n");
    if protected {
        let _ = writeln!(
            out,
            "> **This report is kept permanently** (repository anomalies detected)\n"
        );
    }
    let _ = writeln!(
        out,
        "**Generated**: {}",
        content.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "**Report file**: {}\n", content.file_name);

    render_overview(&mut out, content);
    if let Some(summary) = content.summary {
        render_summary(&mut out, summary);
    }
    if protected {
        render_attention(&mut out, content.attention);
    } else {
        let _ = writeln!(out, "## All clear\n");
        let _ = writeln!(out, "No repository showed an anomaly in this period.\n");
    }
    render_regressions(&mut out, content.states);
    render_details(&mut out, content.states);
    render_disk(&mut out, content.disk);
    render_notes(&mut out, content);
    out
}

fn render_overview(out: &mut String, content: &ReportContent<'_>) {
    let states = content.states;
    let commits: u64 = states.iter().filter_map(|s| s.commit_count).sum();
    let snapshots: usize = states.iter().map(|s| s.snapshots).sum();
    let protected: usize = states.iter().map(|s| s.protected_snapshots.len()).sum();
    let archives: usize = states.iter().map(|s| s.archives).sum();
    let size_kb: u64 = states.iter().map(|s| s.backup_size_kb).sum();

    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(out, "- **Repositories**: {}", states.len());
    let _ = writeln!(out, "- **Total commits**: {}", group_thousands(commits));
    let _ = writeln!(out, "- **Snapshots**: {snapshots} ({protected} protected)");
    let _ = writeln!(out, "- **Archives**: {archives}");
    let _ = writeln!(out, "- **Backup size**: {} MB\n", mb(size_kb));
}

fn render_summary(out: &mut String, summary: &RunSummary) {
    let _ = writeln!(out, "## This run\n");
    let _ = writeln!(out, "- **Processed**: {}", summary.processed);
    let _ = writeln!(out, "- **Skipped**: {}", summary.skipped);
    let _ = writeln!(out, "- **Failed**: {}", summary.failed);
    if summary.cancelled {
        let _ = writeln!(out, "- **Interrupted**: remaining repositories were not processed");
    }
    let _ = writeln!(out);
}

fn render_attention(out: &mut String, attention: &[Attention]) {
    let _ = writeln!(out, "## Needs attention\n");
    let _ = writeln!(
        out,
        "These repositories lost commits or size, possibly from a force-push or history rewrite:\n"
    );
    for item in attention {
        let _ = writeln!(out, "### {}\n", item.identity);
        if !item.alert_tail.is_empty() {
            let _ = writeln!(out, "```");
            for line in &item.alert_tail {
                let _ = writeln!(out, "{line}");
            }
            let _ = writeln!(out, "```\n");
        }

        let mut current = Vec::new();
        if let Some(commits) = item.commit_count {
            current.push(format!("commits {commits}"));
        }
        if let Some(size) = item.size_kb {
            current.push(format!("size {} MB", mb(size)));
        }
        if !current.is_empty() {
            let _ = writeln!(out, "**Current state**: {}\n", current.join(" | "));
        }

        let _ = writeln!(
            out,
            "**Latest snapshot**: {}",
            item.latest_snapshot.as_deref().unwrap_or("none")
        );
        if !item.protected_snapshots.is_empty() {
            let _ = writeln!(
                out,
                "**Protected snapshots** ({}, kept permanently):",
                item.protected_snapshots.len()
            );
            for id in item.protected_snapshots.iter().take(PROTECTED_LISTED) {
                let _ = writeln!(out, "  - {id}");
            }
            if item.protected_snapshots.len() > PROTECTED_LISTED {
                let _ = writeln!(
                    out,
                    "  - ... {} more",
                    item.protected_snapshots.len() - PROTECTED_LISTED
                );
            }
        }
        let _ = writeln!(out, "\n---\n");
    }
}

fn render_regressions(out: &mut String, states: &[RepositoryState]) {
    let changed: Vec<&RepositoryState> = states
        .iter()
        .filter(|s| s.last_commit_alert.is_some())
        .collect();
    if changed.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Commit regressions\n");
    let _ = writeln!(out, "| Repository | Commits | Last alert |");
    let _ = writeln!(out, "|------------|---------|------------|");
    for state in changed {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            state.identity,
            or_na(state.commit_count),
            state.last_commit_alert.as_deref().unwrap_or_default()
        );
    }
    let _ = writeln!(out);
}

fn render_details(out: &mut String, states: &[RepositoryState]) {
    let _ = writeln!(out, "## Repositories\n");
    let _ = writeln!(
        out,
        "| Repository | Commits | Snapshots | Protected | Latest snapshot | Archives | Size | Status |"
    );
    let _ = writeln!(
        out,
        "|------------|---------|-----------|-----------|-----------------|----------|------|--------|"
    );
    for state in states {
        let protected = match state.protected_snapshots.len() {
            0 => "-".to_string(),
            n => n.to_string(),
        };
        let status = if state.last_commit_alert.is_some() {
            "commits dropped"
        } else {
            "ok"
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} MB | {} |",
            state.identity,
            or_na(state.commit_count),
            state.snapshots,
            protected,
            state.latest_snapshot.as_deref().unwrap_or("none"),
            state.archives,
            mb(state.backup_size_kb),
            status
        );
    }
    let _ = writeln!(out);
}

fn render_disk(out: &mut String, disk: Option<&DiskUsage>) {
    let _ = writeln!(out, "## Disk usage\n");
    match disk {
        Some(disk) => {
            let _ = writeln!(out, "- **Filesystem**: {}", disk.filesystem);
            let _ = writeln!(out, "- **Total**: {} MB", group_thousands(mb(disk.total_kb)));
            let _ = writeln!(
                out,
                "- **Used**: {} MB ({})",
                group_thousands(mb(disk.used_kb)),
                disk.capacity
            );
            let _ = writeln!(
                out,
                "- **Available**: {} MB\n",
                group_thousands(mb(disk.available_kb))
            );
        }
        None => {
            let _ = writeln!(out, "Disk usage unavailable.\n");
        }
    }
}

fn render_notes(out: &mut String, content: &ReportContent<'_>) {
    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "**Notes**:");
    let _ = writeln!(
        out,
        "- Snapshots are hardlinked, so they use far less disk than their listed size."
    );
    let _ = writeln!(out, "- Reports are kept for {} days.", content.reports_days);
    let _ = writeln!(
        out,
        "- When an anomaly is detected, the last known-good snapshot and the report are kept permanently."
    );
    let _ = writeln!(out, "- Latest report: {}\n", content.latest_link);
    let _ = writeln!(out, "**Protected items**:");
    let _ = writeln!(out, "- Snapshot marker: `<snapshot>/.protected`");
    let _ = writeln!(out, "- Report marker: `report-<timestamp>.md.protected`");
    let _ = writeln!(
        out,
        "- Delete the marker to revoke protection; the next run cleans up expired items."
    );
}
