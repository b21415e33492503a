// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for configuration loading.
//!
//! Tests the Config module with realistic TOML files on disk.

use std::path::Path;

use mirror_guard::config::Config;
use mirror_guard::config::loader::ConfigLoader;
use mirror_guard::error::ConfigError;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// =============================================================================
// Layering
// =============================================================================

#[test]
fn later_files_override_earlier_ones() {
    let temp = tempfile::tempdir().unwrap();
    let system = write(
        temp.path(),
        "system.toml",
        r#"
[gitea]
docker_container = "gitea-prod"

[backup]
root = "/srv/backup"
organizations = ["acme"]

[alerts]
commit_decrease_threshold = 15
"#,
    );
    let local = write(
        temp.path(),
        "local.toml",
        r"
[alerts]
commit_decrease_threshold = 5

[advanced]
concurrent_backups = 4
",
    );

    let config = ConfigLoader::new()
        .add_toml_file(&system)
        .add_toml_file(&local)
        .build()
        .unwrap();

    assert_eq!(config.gitea.docker_container, "gitea-prod");
    assert_eq!(config.backup.root, Path::new("/srv/backup"));
    assert_eq!(config.backup.organizations, ["acme"]);
    assert_eq!(config.alerts.commit_decrease_threshold, 5);
    assert_eq!(config.advanced.workers(), 4);
}

#[test]
fn set_overrides_beat_files() {
    let temp = tempfile::tempdir().unwrap();
    let file = write(
        temp.path(),
        "config.toml",
        r"
[backup]
archive_day = 3
",
    );

    let config = ConfigLoader::new()
        .add_toml_file(&file)
        .apply_overrides(&["backup.archive_day=15", "alerts.protect_abnormal_snapshots=false"])
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.backup.archive_day, 15);
    assert!(!config.alerts.protect_abnormal_snapshots);
}

#[test]
fn missing_required_file_fails() {
    let temp = tempfile::tempdir().unwrap();
    let result = ConfigLoader::new()
        .add_toml_file(temp.path().join("absent.toml"))
        .build();
    assert!(result.is_err());
}

#[test]
fn optional_file_is_listed_only_when_present() {
    let temp = tempfile::tempdir().unwrap();
    let present = write(temp.path(), "present.toml", "");
    let loader = ConfigLoader::new()
        .add_toml_file_optional(&present)
        .add_toml_file_optional(temp.path().join("absent.toml"));

    let files = loader.loaded_files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].1, present);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn realistic_config_validates() {
    let temp = tempfile::tempdir().unwrap();
    let volume = temp.path().join("gitea");
    std::fs::create_dir_all(volume.join("git/repositories")).unwrap();
    let toml = format!(
        r#"
[gitea]
docker_container = "gitea"
data_volume = "{}"

[backup]
root = "{}"
archive_day = 28

[backup.retention]
snapshots_days = 14
archives_months = 6
reports_days = 60
"#,
        volume.display(),
        temp.path().join("backup").display()
    );

    let config = Config::parse(&toml).unwrap();

    assert!(config.validate().is_empty());
    assert_eq!(config.repos_dir(), volume.join("git/repositories"));
}

#[test]
fn invalid_config_lists_all_problems() {
    let config = Config::parse(
        r#"
[gitea]
docker_container = " "
data_volume = "/nonexistent/mirror-guard/volume"

[backup]
archive_day = 31

[alerts]
size_decrease_threshold = 150
"#,
    )
    .unwrap();

    let problems = config.validate();
    assert_eq!(problems.len(), 4);
    assert!(matches!(
        config.ensure_valid(),
        Err(ConfigError::Invalid(ref all)) if all.len() == 4
    ));
    let text: Vec<String> = problems.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(text.join("\n"), @r"
    missing required config key 'docker_container' in section '[gitea]'
    path for 'data_volume' in section '[gitea]' does not exist: /nonexistent/mirror-guard/volume
    invalid value for 'size_decrease_threshold' in section '[alerts]': must be within 0-100, got 150
    invalid value for 'archive_day' in section '[backup]': must be within 1-28, got 31
    ");
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn json_output_reloads_to_same_options() {
    let config = Config::parse(
        r#"
[backup]
organizations = ["acme", "infra"]

[logging]
file = "/var/log/mirror-guard.log"
console_level = "debug"
"#,
    )
    .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let reloaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(reloaded.format_options(), config.format_options());
}
