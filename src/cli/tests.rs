// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use crate::cli::{Cli, Command};
use clap::Parser;

#[test]
fn test_no_command_means_run() {
    let cli = Cli::try_parse_from(["mirror-guard"]).unwrap();
    assert!(cli.command.is_none());
    assert!(cli.global.configs.is_empty());
}

#[test]
fn test_parse_version() {
    let cli = Cli::try_parse_from(["mirror-guard", "version"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Version)));
}

#[test]
fn test_parse_options_json() {
    let cli = Cli::try_parse_from(["mirror-guard", "options", "--json"]).unwrap();
    let Some(Command::Options(args)) = cli.command else {
        panic!("expected options, got {:?}", cli.command);
    };
    assert!(args.json);
}

#[test]
fn test_parse_global_options() {
    let cli = Cli::try_parse_from([
        "mirror-guard",
        "-c",
        "/etc/a.toml",
        "--config",
        "b.toml",
        "-s",
        "backup.root=/srv/backup",
        "--set",
        "alerts.commit_decrease_threshold=5",
        "-l",
        "4",
        "--log-file",
        "/var/log/mirror-guard.log",
        "cleanup",
    ])
    .unwrap();

    assert!(matches!(cli.command, Some(Command::Cleanup)));
    assert_eq!(
        cli.global.configs,
        [PathBuf::from("/etc/a.toml"), PathBuf::from("b.toml")]
    );
    insta::assert_snapshot!(cli.global.to_config_overrides().join("\n"), @r"
    backup.root=/srv/backup
    alerts.commit_decrease_threshold=5
    logging.console_level=4
    logging.file=/var/log/mirror-guard.log
    ");
}

#[test]
fn test_log_level_out_of_range() {
    assert!(Cli::try_parse_from(["mirror-guard", "-l", "7", "run"]).is_err());
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["mirror-guard", "restore"]).is_err());
}
