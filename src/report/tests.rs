// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use chrono::{Local, TimeZone};

use super::render::{ReportContent, group_thousands, render};
use super::{DiskUsage, ReportGenerator, RepositoryState, collect_states, update_latest_link};
use crate::detect::append_alert;
use crate::layout::BackupLayout;
use crate::orchestrator::RunSummary;
use crate::repo::RepositoryIdentity;
use crate::review::ReviewQueue;

fn seed_repo(layout: &BackupLayout, owner: &str, name: &str, commits: u64) {
    let paths = layout.repo(&RepositoryIdentity::new(owner, name));
    let snapshot = paths.snapshots().join("20260313-010000");
    std::fs::create_dir_all(&snapshot).unwrap();
    std::fs::write(snapshot.join(".snapshot_meta"), format!("commit_count={commits}\n")).unwrap();
    std::fs::write(paths.commit_tracking(), commits.to_string()).unwrap();
}

#[test]
fn test_group_thousands() {
    assert_eq!(group_thousands(0), "0");
    assert_eq!(group_thousands(999), "999");
    assert_eq!(group_thousands(1000), "1,000");
    assert_eq!(group_thousands(1_234_567), "1,234,567");
}

#[test]
fn test_disk_usage_parse() {
    let output = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                  /dev/sda1        1048576   524288    524288      50% /\n";
    let usage = DiskUsage::parse(output).unwrap();
    assert_eq!(usage.filesystem, "/dev/sda1");
    assert_eq!(usage.total_kb, 1_048_576);
    assert_eq!(usage.capacity, "50%");
    assert!(DiskUsage::parse("Filesystem\n").is_none());
}

#[test]
fn test_render_all_clear() {
    let states = vec![RepositoryState {
        identity: RepositoryIdentity::new("acme", "tools"),
        commit_count: Some(1_234_567),
        size_kb: Some(2048),
        backup_size_kb: 3072,
        snapshots: 2,
        protected_snapshots: vec!["20260301-020000".to_string()],
        latest_snapshot: Some("20260314-020000".to_string()),
        archives: 1,
        last_commit_alert: Some("Commit count dropped by 16%".to_string()),
    }];
    let summary = RunSummary {
        processed: 1,
        skipped: 2,
        ..RunSummary::default()
    };
    let disk = DiskUsage {
        filesystem: "/dev/sda1".to_string(),
        total_kb: 1_048_576,
        used_kb: 524_288,
        available_kb: 524_288,
        capacity: "50%".to_string(),
    };

    let text = render(&ReportContent {
        generated_at: Local.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap(),
        file_name: "report-20260314-020000.md",
        states: &states,
        attention: &[],
        summary: Some(&summary),
        disk: Some(&disk),
        reports_days: 30,
        latest_link: "latest-report.md",
    });

    insta::assert_snapshot!(text, @r"
    # Mirror Backup Report

    **Generated**: 2026-03-14 02:00:00
    **Report file**: report-20260314-020000.md

    ## Overview

    - **Repositories**: 1
    - **Total commits**: 1,234,567
    - **Snapshots**: 2 (1 protected)
    - **Archives**: 1
    - **Backup size**: 3 MB

    ## This run

    - **Processed**: 1
    - **Skipped**: 2
    - **Failed**: 0

    ## All clear

    No repository showed an anomaly in this period.

    ## Commit regressions

    | Repository | Commits | Last alert |
    |------------|---------|------------|
    | acme/tools | 1234567 | Commit count dropped by 16% |

    ## Repositories

    | Repository | Commits | Snapshots | Protected | Latest snapshot | Archives | Size | Status |
    |------------|---------|-----------|-----------|-----------------|----------|------|--------|
    | acme/tools | 1234567 | 2 | 1 | 20260314-020000 | 1 | 3 MB | commits dropped |

    ## Disk usage

    - **Filesystem**: /dev/sda1
    - **Total**: 1,024 MB
    - **Used**: 512 MB (50%)
    - **Available**: 512 MB

    ---

    **Notes**:
    - Snapshots are hardlinked, so they use far less disk than their listed size.
    - Reports are kept for 30 days.
    - When an anomaly is detected, the last known-good snapshot and the report are kept permanently.
    - Latest report: latest-report.md

    **Protected items**:
    - Snapshot marker: `<snapshot>/.protected`
    - Report marker: `report-<timestamp>.md.protected`
    - Delete the marker to revoke protection; the next run cleans up expired items.
    ");
}

#[test]
fn test_collect_states() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    seed_repo(&layout, "acme", "tools", 120);
    seed_repo(&layout, "acme", "api", 7);

    let states = collect_states(&layout);

    let names: Vec<String> = states.iter().map(|s| s.identity().full_name()).collect();
    assert_eq!(names, ["acme/api", "acme/tools"]);
    assert_eq!(states[1].commit_count(), Some(120));
    assert_eq!(states[1].snapshots(), 1);
    assert!(states[1].protected_snapshots().is_empty());
    assert_eq!(states[1].archives(), 0);
}

#[tokio::test]
async fn test_generate_without_alerts_is_unprotected() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    seed_repo(&layout, "acme", "tools", 120);
    let queue = ReviewQueue::new(layout.review_queue());

    let report = ReportGenerator::new(&layout, &queue, 20, 30)
        .generate(&collect_states(&layout), None, Local::now())
        .await
        .unwrap();

    assert!(!report.is_protected());
    assert!(report.reviewed().is_empty());
    let text = std::fs::read_to_string(report.path()).unwrap();
    assert!(text.contains("## All clear"));
    assert!(!text.contains("## This run"));

    let mut sidecar = report.path().as_os_str().to_os_string();
    sidecar.push(".protected");
    assert!(!Path::new(&sidecar).exists());
}

#[tokio::test]
async fn test_generate_with_alerts_protects_and_drains() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    seed_repo(&layout, "acme", "tools", 100);
    let identity = RepositoryIdentity::new("acme", "tools");
    append_alert(
        &layout.repo(&identity).alerts(),
        Local::now(),
        &["Commit count dropped by 16%".to_string()],
    )
    .unwrap();
    let queue = ReviewQueue::new(layout.review_queue());
    queue.enqueue(&identity).unwrap();

    let report = ReportGenerator::new(&layout, &queue, 20, 30)
        .generate(&collect_states(&layout), Some(&RunSummary::default()), Local::now())
        .await
        .unwrap();

    assert!(report.is_protected());
    assert_eq!(report.reviewed(), [identity]);
    assert!(queue.entries().is_empty());
    assert!(!layout.review_queue().exists());

    let mut sidecar = report.path().as_os_str().to_os_string();
    sidecar.push(".protected");
    let marker = std::fs::read_to_string(Path::new(&sidecar)).unwrap();
    assert!(marker.contains("#   - acme/tools"));

    let text = std::fs::read_to_string(report.path()).unwrap();
    assert!(text.contains("> **This report is kept permanently**"));
    assert!(text.contains("### acme/tools"));
    assert!(text.contains("Commit count dropped by 16%"));
    assert!(text.contains("**Current state**: commits 100"));
    assert!(text.contains("| acme/tools | 100 | Commit count dropped by 16% |"));
    assert!(!text.contains("## All clear"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_latest_link_points_to_newest_report() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    let queue = ReviewQueue::new(layout.review_queue());
    let generator = ReportGenerator::new(&layout, &queue, 20, 30);
    let at = Local.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap();

    let first = generator.generate(&[], None, at).await.unwrap();
    let second = generator.generate(&[], None, at).await.unwrap();

    assert_ne!(first.path(), second.path());
    assert_eq!(
        std::fs::read_link(layout.latest_link()).unwrap(),
        Path::new("reports/report-20260314-020000-1.md")
    );
    assert_eq!(
        std::fs::read_to_string(layout.latest_link()).unwrap(),
        std::fs::read_to_string(second.path()).unwrap()
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_report_is_readable_by_others() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    let queue = ReviewQueue::new(layout.review_queue());

    let report = ReportGenerator::new(&layout, &queue, 20, 30)
        .generate(&[], None, Local::now())
        .await
        .unwrap();

    let mode = std::fs::metadata(report.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[cfg(unix)]
#[test]
fn test_latest_link_replaces_regular_file() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("reports/report-1.md");
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, "new").unwrap();
    let link = temp.path().join("latest-report.md");
    std::fs::write(&link, "stale").unwrap();

    update_latest_link(&link, &target).unwrap();

    assert_eq!(std::fs::read_to_string(&link).unwrap(), "new");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
}

#[tokio::test]
async fn test_failed_marker_keeps_queue_for_next_report() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    seed_repo(&layout, "acme", "tools", 100);
    let identity = RepositoryIdentity::new("acme", "tools");
    let queue = ReviewQueue::new(layout.review_queue());
    queue.enqueue(&identity).unwrap();
    let generator = ReportGenerator::new(&layout, &queue, 20, 30);
    let at = Local.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap();

    // A directory where the marker file should go makes the write fail.
    let blocked = layout.reports_dir().join("report-20260314-020000.md.protected");
    std::fs::create_dir_all(&blocked).unwrap();

    let first = generator.generate(&collect_states(&layout), None, at).await.unwrap();

    assert!(!first.is_protected());
    assert!(blocked.is_dir());
    assert_eq!(queue.entries(), [identity.clone()]);
    assert!(std::fs::read_to_string(first.path()).unwrap().contains("### acme/tools"));

    let second = generator.generate(&collect_states(&layout), None, at).await.unwrap();

    assert_eq!(
        second.path().file_name().unwrap(),
        std::ffi::OsStr::new("report-20260314-020000-1.md")
    );
    assert!(second.is_protected());
    assert_eq!(second.reviewed(), [identity]);
    let mut sidecar = second.path().as_os_str().to_os_string();
    sidecar.push(".protected");
    assert!(Path::new(&sidecar).is_file());
    assert!(queue.is_empty());
    assert!(!queue.claimed_path().exists());
}

#[tokio::test]
async fn test_generate_merges_earlier_claim_with_new_entries() {
    let temp = tempfile::tempdir().unwrap();
    let layout = BackupLayout::new(temp.path());
    let queue = ReviewQueue::new(layout.review_queue());
    queue.enqueue(&RepositoryIdentity::new("acme", "tools")).unwrap();
    // Left behind by an earlier report whose marker failed.
    queue.claim().unwrap();
    queue.enqueue(&RepositoryIdentity::new("zeta", "last")).unwrap();

    let report = ReportGenerator::new(&layout, &queue, 20, 30)
        .generate(&[], None, Local::now())
        .await
        .unwrap();

    let names: Vec<String> = report
        .reviewed()
        .iter()
        .map(RepositoryIdentity::full_name)
        .collect();
    assert_eq!(names, ["acme/tools", "zeta/last"]);
    assert!(report.is_protected());
    assert!(queue.is_empty());
}
