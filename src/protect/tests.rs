// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use chrono::{Local, TimeZone};

use super::{ProtectTarget, ProtectionMarker, is_protected, protect, read};

fn fixed_time() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap()
}

#[test]
fn test_marker_paths() {
    assert_eq!(
        ProtectTarget::Snapshot(Path::new("/b/acme/tools/snapshots/20260301-020000")).marker_path(),
        Path::new("/b/acme/tools/snapshots/20260301-020000/.protected")
    );
    assert_eq!(
        ProtectTarget::Report(Path::new("/b/reports/report-20260301-020000.md")).marker_path(),
        Path::new("/b/reports/report-20260301-020000.md.protected")
    );
}

#[test]
fn test_snapshot_marker_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let target = ProtectTarget::Snapshot(temp.path());
    assert!(!is_protected(target));

    let reasons = vec![
        "Commit count dropped by 16%".to_string(),
        "Previous: 120 commits -> current: 100 commits".to_string(),
    ];
    protect(target, "acme/tools", &reasons, fixed_time()).unwrap();

    assert!(is_protected(target));
    let marker = read(target).unwrap();
    assert_eq!(marker.reasons(), reasons.as_slice());
    assert_eq!(marker.subject(), Some("acme/tools"));
    assert!(marker.marked_at().unwrap().starts_with("2026-03-14T02:00:00"));
}

#[test]
fn test_protect_twice_overwrites_trail() {
    let temp = tempfile::tempdir().unwrap();
    let target = ProtectTarget::Snapshot(temp.path());

    protect(target, "acme/tools", &["first".to_string()], fixed_time()).unwrap();
    protect(target, "acme/tools", &["second".to_string()], fixed_time()).unwrap();

    assert!(is_protected(target));
    assert_eq!(read(target).unwrap().reasons(), ["second".to_string()]);
}

#[test]
fn test_report_marker_text() {
    let temp = tempfile::tempdir().unwrap();
    let report = temp.path().join("report-20260314-020000.md");
    std::fs::write(&report, "# report").unwrap();
    let target = ProtectTarget::Report(&report);

    let path = protect(target, "report-20260314-020000.md", &["acme/tools".to_string()], fixed_time())
        .unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    let without_time: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with("# Marked at:"))
        .collect();

    insta::assert_snapshot!(without_time.join("\n"), @r"
    # Report marked for permanent retention
    # Reason: repositories raised alerts during this run
    # Report: report-20260314-020000.md
    #
    # Repositories needing review:
    #   - acme/tools
    #
    # Delete this file to revoke protection.
    ");
}

#[test]
fn test_hand_written_marker_still_protects() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join(".protected"), "keep\n").unwrap();
    let target = ProtectTarget::Snapshot(temp.path());

    assert!(is_protected(target));
    assert_eq!(read(target).unwrap(), ProtectionMarker::default());
}
