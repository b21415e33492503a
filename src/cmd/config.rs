// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Config-related commands for mirror-guard.

use anyhow::Context;

use crate::cli::OptionsArgs;
use crate::config::Config;
use crate::error::{ConfigError, Result};

/// Display current configuration options.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized as JSON.
pub fn run_options_command(args: &OptionsArgs, config: &Config) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        println!("{json}");
    } else {
        for line in config.format_options() {
            println!("{line}");
        }
    }
    Ok(())
}

/// Display loaded configuration files.
pub fn run_configs_command(config_files: &[String]) {
    if config_files.is_empty() {
        println!("No configuration files loaded");
    } else {
        for line in config_files {
            println!("{line}");
        }
    }
}

/// Validates the configuration and prints every problem found.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if any rule is violated.
pub fn run_validate_command(config: &Config) -> std::result::Result<(), ConfigError> {
    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration is valid");
        return Ok(());
    }
    for problem in &problems {
        eprintln!("  - {problem}");
    }
    Err(ConfigError::Invalid(problems))
}
