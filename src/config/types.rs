// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration section types.
//!
//! # Config Structure
//!
//! ```text
//! Config
//!   gitea     container, git user, data volume, repository paths
//!   backup    root, organization allow-list, archive day
//!     retention   snapshots_days, archives_months, reports_days
//!   alerts    thresholds, escalation, alert history lines
//!   logging   file, console_level, file_level
//!   reports   directory, latest_link
//!   advanced  concurrency, command timeout, docker check
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogLevel;

/// Where the git server keeps its repositories and how to reach its container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GiteaConfig {
    /// Name of the container running the git server.
    pub docker_container: String,
    /// User that owns the repositories inside the container.
    pub docker_git_user: String,
    /// Host path of the server's data volume.
    pub data_volume: PathBuf,
    /// Repository root, relative to `data_volume`.
    pub repos_path: PathBuf,
    /// Repository root as seen from inside the container.
    pub container_repos_path: String,
}

impl Default for GiteaConfig {
    fn default() -> Self {
        Self {
            docker_container: "gitea".to_string(),
            docker_git_user: "git".to_string(),
            data_volume: PathBuf::from("/opt/gitea/gitea"),
            repos_path: PathBuf::from("git/repositories"),
            container_repos_path: "/data/git/repositories".to_string(),
        }
    }
}

impl GiteaConfig {
    /// Host directory holding `<owner>/<name>.git` trees.
    #[must_use]
    pub fn host_repos_dir(&self) -> PathBuf {
        self.data_volume.join(&self.repos_path)
    }
}

/// Backup destination and repository selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Root of the backup tree.
    pub root: PathBuf,
    /// Organization allow-list, compared case-insensitively. Empty means all.
    pub organizations: Vec<String>,
    /// Only back up repositories that have an upstream remote configured.
    pub check_mirror_only: bool,
    /// First day of the month on which the monthly archive becomes due.
    pub archive_day: u32,
    /// Retention windows.
    pub retention: RetentionConfig,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/opt/backup/gitea-mirrors"),
            organizations: Vec::new(),
            check_mirror_only: false,
            archive_day: 1,
            retention: RetentionConfig::default(),
        }
    }
}

impl BackupConfig {
    /// Returns true if `owner` passes the organization allow-list.
    #[must_use]
    pub fn allows_owner(&self, owner: &str) -> bool {
        self.organizations.is_empty()
            || self
                .organizations
                .iter()
                .any(|org| org.trim().eq_ignore_ascii_case(owner))
    }
}

/// Retention windows for the three prunable artifact kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub snapshots_days: u32,
    pub archives_months: u32,
    pub reports_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            snapshots_days: 30,
            archives_months: 12,
            reports_days: 30,
        }
    }
}

/// Regression thresholds and escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    /// Whole-percent commit-count decrease that must be exceeded to alert.
    pub commit_decrease_threshold: u32,
    /// Whole-percent size decrease that must be exceeded to alert.
    pub size_decrease_threshold: u32,
    /// Protect the previous snapshot when an alert fires.
    pub protect_abnormal_snapshots: bool,
    /// Number of trailing alert-log lines shown per repository in a report.
    pub alert_history_lines: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            commit_decrease_threshold: 10,
            size_decrease_threshold: 30,
            protect_abnormal_snapshots: true,
            alert_history_lines: 20,
        }
    }
}

/// Log destinations and verbosity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Optional log file, appended to.
    pub file: Option<PathBuf>,
    /// Write the log file as JSON lines.
    pub json: bool,
    pub console_level: LogLevel,
    pub file_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            json: false,
            console_level: LogLevel::INFO,
            file_level: LogLevel::DEBUG,
        }
    }
}

/// Report placement, relative to the backup root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportsConfig {
    pub directory: PathBuf,
    pub latest_link: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("reports"),
            latest_link: PathBuf::from("latest-report.md"),
        }
    }
}

/// Tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvancedConfig {
    /// Repositories processed in parallel. 0 or 1 runs sequentially.
    pub concurrent_backups: usize,
    /// Timeout for each external command in seconds. 0 disables it.
    pub command_timeout_secs: u64,
    /// Check the docker CLI and container before a run.
    pub verify_docker: bool,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            concurrent_backups: 0,
            command_timeout_secs: 0,
            verify_docker: true,
        }
    }
}

impl AdvancedConfig {
    #[must_use]
    pub const fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }

    /// Effective worker count, at least one.
    #[must_use]
    pub const fn workers(&self) -> usize {
        if self.concurrent_backups == 0 {
            1
        } else {
            self.concurrent_backups
        }
    }
}
