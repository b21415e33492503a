// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{
    ArchiveError, ConfigError, FsError, GuardError, GuardResult, ProcessError, RepoOpsError,
    Severity, SnapshotError,
};

#[test]
fn test_config_error_display() {
    let err = ConfigError::MissingKey {
        section: "gitea".to_string(),
        key: "docker_container".to_string(),
    };
    insta::assert_snapshot!(
        err.to_string(),
        @"missing required config key 'docker_container' in section '[gitea]'"
    );
}

#[test]
fn test_config_error_invalid_joins_all_problems() {
    let err = ConfigError::Invalid(vec![
        ConfigError::MissingKey {
            section: "backup".to_string(),
            key: "root".to_string(),
        },
        ConfigError::InvalidValue {
            section: "alerts".to_string(),
            key: "commit_decrease_threshold".to_string(),
            message: "must be within 0-100, got 120".to_string(),
        },
    ]);
    insta::assert_snapshot!(
        err.to_string(),
        @"2 configuration problem(s): missing required config key 'root' in section '[backup]'; invalid value for 'commit_decrease_threshold' in section '[alerts]': must be within 0-100, got 120"
    );
}

#[test]
fn test_guard_error_size() {
    // Box<str> variants are 16 bytes (fat pointer), plus discriminant = 24
    let size = std::mem::size_of::<GuardError>();
    assert!(size <= 24, "GuardError is {size} bytes, expected <= 24");
}

#[test]
fn test_guard_result_size() {
    let size = std::mem::size_of::<GuardResult<()>>();
    assert!(size <= 24, "GuardResult<()> is {size} bytes, expected <= 24");
}

#[test]
fn test_severity_classification() {
    let copy_failed = GuardError::from(SnapshotError::CopyFailed {
        repo: "org/repo".to_string(),
        source: RepoOpsError::CopyFailed {
            src: "/a".to_string(),
            dst: "/b".to_string(),
            source: std::io::Error::other("disk full"),
        },
    });
    let config = GuardError::from(ConfigError::MissingKey {
        section: "backup".to_string(),
        key: "root".to_string(),
    });
    let export = GuardError::from(ArchiveError::PersistFailed {
        path: "/x".to_string(),
        source: std::io::Error::other("nope"),
    });
    let fs = GuardError::from(FsError::NotFound("/missing".to_string()));

    assert_eq!(copy_failed.severity(), Severity::Repository);
    assert_eq!(config.severity(), Severity::Run);
    assert_eq!(export.severity(), Severity::Warning);
    assert_eq!(fs.severity(), Severity::Repository);
    assert!(Severity::Warning < Severity::Repository);
    assert!(Severity::Repository < Severity::Run);
}

#[test]
fn test_timeout_is_not_run_fatal() {
    let err = GuardError::from(RepoOpsError::Process(ProcessError::Timeout {
        command: "docker exec".to_string(),
        timeout_secs: 5,
    }));
    assert!(err.is_timeout());
    assert_ne!(err.severity(), Severity::Run);
}

#[test]
fn test_fs_error_maps_io_kind() {
    let path = std::path::Path::new("/nope");
    let not_found = FsError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound));
    let denied = FsError::io(
        path,
        std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    );
    assert!(matches!(not_found, FsError::NotFound(_)));
    assert!(matches!(denied, FsError::PermissionDenied(_)));
}
