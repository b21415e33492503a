// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use super::builder::{ProcessBuilder, ProcessFlags};
use crate::error::ProcessError;

#[tokio::test]
async fn test_process_echo() {
    let output = ProcessBuilder::new("echo")
        .arg("hello")
        .capture_output()
        .run()
        .await
        .expect("echo should succeed");

    assert!(output.success());
    insta::assert_snapshot!(output.stdout().trim(), @"hello");
}

#[tokio::test]
async fn test_process_exit_code_allowed() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "exit 42"])
        .flag(ProcessFlags::ALLOW_FAILURE)
        .run()
        .await
        .expect("process should complete");

    assert_eq!(output.exit_code(), 42);
}

#[tokio::test]
async fn test_process_non_zero_exit_is_typed() {
    let err = ProcessBuilder::new("/bin/sh")
        .args(["-c", "echo broken >&2; exit 3"])
        .capture_output()
        .flag(ProcessFlags::IGNORE_OUTPUT_ON_FAILURE)
        .run()
        .await
        .unwrap_err();

    match err {
        ProcessError::NonZeroExit { code, stderr, .. } => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_process_success_codes() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "exit 1"])
        .success_codes([0, 1])
        .run()
        .await
        .expect("exit 1 is accepted");
    assert_eq!(output.exit_code(), 1);
}

#[tokio::test]
async fn test_process_timeout() {
    let err = ProcessBuilder::new("sleep")
        .arg("5")
        .maybe_timeout(Some(Duration::from_millis(100)))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::Timeout { .. }), "{err}");
}

#[tokio::test]
async fn test_process_spawn_failure() {
    let err = ProcessBuilder::new("/nonexistent/mirror-guard-binary")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::SpawnFailed { .. }));
}

#[test]
fn test_command_line_quotes_spaces() {
    let builder = ProcessBuilder::new("git").args(["log", "--format=%H %s"]);
    assert_eq!(builder.command_line(), "git log \"--format=%H %s\"");
}

#[test]
fn test_executable_lookup_found() {
    let builder = ProcessBuilder::which("sh").expect("sh should be in PATH");
    assert!(builder.program().exists());
    assert!(ProcessBuilder::exists("sh"));
    assert_eq!(ProcessBuilder::find("sh"), Some(builder.program().clone()));
}

#[test]
fn test_executable_lookup_not_found() {
    let program = "nonexistent_program_12345";

    let err = ProcessBuilder::which(program).unwrap_err();
    assert!(err.to_string().contains(program));
    assert!(!ProcessBuilder::exists(program));
    assert!(ProcessBuilder::find(program).is_none());
}
