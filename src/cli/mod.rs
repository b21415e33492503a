// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for mirror-guard using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! mirror-guard [global options] [command]
//! run            (default) snapshot, detect, retain, archive, report
//! report         write a report from the current backup tree
//! cleanup        prune expired reports
//! options        show the effective configuration [--json]
//! configs        list the loaded config files
//! validate       check the configuration
//! version
//! ```

pub mod global;

#[cfg(test)]
mod tests;

use crate::cli::global::GlobalOptions;
use clap::{Args, Parser, Subcommand};

/// Snapshot & anomaly protection for mirrored git repositories.
#[derive(Debug, Parser)]
#[command(
    name = "mirror-guard",
    author,
    version,
    about = "Snapshot & anomaly protection for mirrored git repositories",
    long_about = "mirror-guard Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Takes hardlinked snapshots of the repositories of a containerized\n\
                  git server, watches commit counts and sizes for sudden drops, and\n\
                  keeps the last good snapshot when one is found.\n\n\
                  Invoking `mirror-guard` without a command performs a full run.\n\
                  See `mirror-guard <command> --help` for more information.",
    after_help = "CONFIG FILES:\n\n\
                  By default, mirror-guard reads /etc/mirror-guard/config.toml,\n\
                  ~/.config/mirror-guard/config.toml and ./mirror-guard.toml, in that\n\
                  order, when they exist. Files given with --config are loaded after\n\
                  those, then MIRROR_GUARD_* environment variables (for example\n\
                  MIRROR_GUARD_BACKUP__ROOT), then --set overrides.\n\n\
                  EXIT CODES:\n\n\
                  0 success, 1 failure, 2 invalid configuration, 130 interrupted."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute, `run` if omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Backs up every eligible repository, then writes a report.
    Run,

    /// Writes a report of the backup tree and clears the review queue.
    Report,

    /// Removes reports older than the retention window.
    Cleanup,

    /// Lists all options and their effective values.
    Options(OptionsArgs),

    /// Lists the configuration files that were loaded.
    Configs,

    /// Checks the configuration and lists every problem found.
    Validate,
}

/// Arguments of `options`.
#[derive(Debug, Clone, Default, Args)]
pub struct OptionsArgs {
    /// Prints the configuration as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
