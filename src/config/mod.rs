// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration management for mirror-guard.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. defaults
//! 2. /etc/mirror-guard/config.toml
//! 3. ~/.config/mirror-guard/config.toml
//! 4. mirror-guard.toml (cwd)
//! 5. --config FILE (repeatable)
//! 6. MIRROR_GUARD_* env vars
//! 7. --set KEY=VALUE
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! MIRROR_GUARD_BACKUP__ROOT=/srv/backup         → backup.root
//! MIRROR_GUARD_ALERTS__COMMIT_DECREASE_THRESHOLD=5
//! MIRROR_GUARD_BACKUP__ORGANIZATIONS=acme,infra → backup.organizations = ["acme", "infra"]
//! ```
//!
//! Loading never validates. [`Config::validate`] runs once at startup and
//! every problem it reports is run-fatal.

pub mod loader;
pub mod types;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

use loader::ConfigLoader;
use types::{
    AdvancedConfig, AlertsConfig, BackupConfig, GiteaConfig, LoggingConfig, ReportsConfig,
};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gitea: GiteaConfig,
    pub backup: BackupConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
    pub reports: ReportsConfig,
    pub advanced: AdvancedConfig,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mirror_guard::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file_optional("/etc/mirror-guard/config.toml")
    ///     .with_env_prefix("MIRROR_GUARD")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file (simple API).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not match the
    /// `Config` structure.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Host directory holding the server's repositories.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.gitea.host_repos_dir()
    }

    /// Checks every rule and returns all violations, empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        let mut require = |section: &str, key: &str, empty: bool| {
            if empty {
                problems.push(ConfigError::MissingKey {
                    section: section.to_string(),
                    key: key.to_string(),
                });
            }
        };
        require(
            "gitea",
            "docker_container",
            self.gitea.docker_container.trim().is_empty(),
        );
        require(
            "gitea",
            "data_volume",
            self.gitea.data_volume.as_os_str().is_empty(),
        );
        require("backup", "root", self.backup.root.as_os_str().is_empty());

        if !self.gitea.data_volume.as_os_str().is_empty() && !self.gitea.data_volume.is_dir() {
            problems.push(ConfigError::PathNotFound {
                section: "gitea".to_string(),
                key: "data_volume".to_string(),
                path: self.gitea.data_volume.display().to_string(),
            });
        }

        for (key, value) in [
            (
                "commit_decrease_threshold",
                self.alerts.commit_decrease_threshold,
            ),
            (
                "size_decrease_threshold",
                self.alerts.size_decrease_threshold,
            ),
        ] {
            if value > 100 {
                problems.push(invalid(
                    "alerts",
                    key,
                    format!("must be within 0-100, got {value}"),
                ));
            }
        }

        let retention = &self.backup.retention;
        for (key, value) in [
            ("snapshots_days", retention.snapshots_days),
            ("archives_months", retention.archives_months),
            ("reports_days", retention.reports_days),
        ] {
            if value == 0 {
                problems.push(invalid(
                    "backup.retention",
                    key,
                    "must be at least 1".to_string(),
                ));
            }
        }

        if !(1..=28).contains(&self.backup.archive_day) {
            problems.push(invalid(
                "backup",
                "archive_day",
                format!("must be within 1-28, got {}", self.backup.archive_day),
            ));
        }

        problems
    }

    /// Runs [`Self::validate`] and folds the problems into one error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` listing every violation.
    pub fn ensure_valid(&self) -> std::result::Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Format configuration options for display.
    ///
    /// Output is deterministically ordered using `BTreeMap`.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();
        self.format_gitea_options(&mut options);
        self.format_backup_options(&mut options);
        self.format_alerts_options(&mut options);
        self.format_logging_options(&mut options);
        self.format_reports_options(&mut options);
        self.format_advanced_options(&mut options);

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }

    fn format_gitea_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "gitea.docker_container".into(),
            self.gitea.docker_container.clone(),
        );
        options.insert(
            "gitea.docker_git_user".into(),
            self.gitea.docker_git_user.clone(),
        );
        options.insert(
            "gitea.data_volume".into(),
            self.gitea.data_volume.display().to_string(),
        );
        options.insert(
            "gitea.repos_path".into(),
            self.gitea.repos_path.display().to_string(),
        );
        options.insert(
            "gitea.container_repos_path".into(),
            self.gitea.container_repos_path.clone(),
        );
    }

    fn format_backup_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "backup.root".into(),
            self.backup.root.display().to_string(),
        );
        options.insert(
            "backup.organizations".into(),
            if self.backup.organizations.is_empty() {
                "(all)".to_string()
            } else {
                self.backup.organizations.join(",")
            },
        );
        options.insert(
            "backup.check_mirror_only".into(),
            self.backup.check_mirror_only.to_string(),
        );
        options.insert(
            "backup.archive_day".into(),
            self.backup.archive_day.to_string(),
        );
        let retention = &self.backup.retention;
        options.insert(
            "backup.retention.snapshots_days".into(),
            retention.snapshots_days.to_string(),
        );
        options.insert(
            "backup.retention.archives_months".into(),
            retention.archives_months.to_string(),
        );
        options.insert(
            "backup.retention.reports_days".into(),
            retention.reports_days.to_string(),
        );
    }

    fn format_alerts_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "alerts.commit_decrease_threshold".into(),
            self.alerts.commit_decrease_threshold.to_string(),
        );
        options.insert(
            "alerts.size_decrease_threshold".into(),
            self.alerts.size_decrease_threshold.to_string(),
        );
        options.insert(
            "alerts.protect_abnormal_snapshots".into(),
            self.alerts.protect_abnormal_snapshots.to_string(),
        );
        options.insert(
            "alerts.alert_history_lines".into(),
            self.alerts.alert_history_lines.to_string(),
        );
    }

    fn format_logging_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "logging.file".into(),
            self.logging
                .file
                .as_ref()
                .map_or_else(String::new, |p| p.display().to_string()),
        );
        options.insert("logging.json".into(), self.logging.json.to_string());
        options.insert(
            "logging.console_level".into(),
            self.logging.console_level.as_u8().to_string(),
        );
        options.insert(
            "logging.file_level".into(),
            self.logging.file_level.as_u8().to_string(),
        );
    }

    fn format_reports_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "reports.directory".into(),
            self.reports.directory.display().to_string(),
        );
        options.insert(
            "reports.latest_link".into(),
            self.reports.latest_link.display().to_string(),
        );
    }

    fn format_advanced_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "advanced.concurrent_backups".into(),
            self.advanced.concurrent_backups.to_string(),
        );
        options.insert(
            "advanced.command_timeout_secs".into(),
            self.advanced.command_timeout_secs.to_string(),
        );
        options.insert(
            "advanced.verify_docker".into(),
            self.advanced.verify_docker.to_string(),
        );
    }
}

fn invalid(section: &str, key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        message,
    }
}
