// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Global CLI options available for all commands.
//!
//! # Option Precedence
//!
//! ```text
//! --config FILE      ← Additional config files (can repeat)
//! --set KEY=VAL      ← Direct config override (can repeat)
//! --log-level N      ← Console verbosity (0-6)
//! --file-log-level N ← File verbosity
//! --log-file FILE    ← logging.file override
//!
//! Precedence: CLI flags > --set > env > --config > default locations > defaults
//! ```

use clap::Args;
use std::path::PathBuf;

/// Global options available for all commands.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Path to additional TOML configuration file(s), loaded after the
    /// default locations. Can be specified multiple times.
    #[arg(short = 'c', long = "config", value_name = "FILE", action = clap::ArgAction::Append)]
    pub configs: Vec<PathBuf>,

    /// Sets an option, such as 'alerts.commit_decrease_threshold=5'.
    /// Can be specified multiple times.
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub options: Vec<String>,

    /// Console log level (0=silent, 1=errors, 2=warnings, 3=info, 4=debug, 5=trace, 6=dump).
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub log_level: Option<u8>,

    /// File log level.
    #[arg(long = "file-log-level", value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub file_log_level: Option<u8>,

    /// Path to log file, appended to.
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Skips /etc, the user config directory and ./mirror-guard.toml; only
    /// --config files are read.
    #[arg(long = "no-default-configs")]
    pub no_default_configs: bool,
}

impl GlobalOptions {
    /// Converts command-line options to configuration overrides, applied in
    /// order after every other source.
    #[must_use]
    pub fn to_config_overrides(&self) -> Vec<String> {
        let mut overrides = self.options.clone();

        if let Some(level) = self.log_level {
            overrides.push(format!("logging.console_level={level}"));
        }

        if let Some(level) = self.file_log_level {
            overrides.push(format!("logging.file_level={level}"));
        }

        if let Some(ref path) = self.log_file {
            overrides.push(format!("logging.file={}", path.display()));
        }

        overrides
    }
}
