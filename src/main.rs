// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Config (files, env, --set) --> Logging --> Command Dispatch
//!   Run | Report | Cleanup | Options | Configs | Validate | Version
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use mirror_guard::cli::global::GlobalOptions;
use mirror_guard::cli::{self, Command};
use mirror_guard::cmd::cleanup::run_cleanup_command;
use mirror_guard::cmd::config::{run_configs_command, run_options_command, run_validate_command};
use mirror_guard::cmd::exit;
use mirror_guard::cmd::report::run_report_command;
use mirror_guard::cmd::run::run_backup_command;
use mirror_guard::config::Config;
use mirror_guard::config::loader::ConfigLoader;
use mirror_guard::logging::{LogConfig, init_logging};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Environment variable prefix for config overrides.
const ENV_PREFIX: &str = "MIRROR_GUARD";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if matches!(cli.command, Some(Command::Version)) {
        handle_version_command();
        return ExitCode::SUCCESS;
    }

    let loader = build_config_loader(&cli.global);
    if matches!(cli.command, Some(Command::Configs)) {
        run_configs_command(&loader.format_loaded_files());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(loader, &cli.global) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::from(exit::CONFIG);
        }
    };

    let _log_guard = match init_logging(&build_log_config(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::from(exit::FAILURE);
        }
    };

    dispatch_command(&cli, config).await
}

fn build_log_config(config: &Config) -> LogConfig {
    LogConfig::builder()
        .with_console_level(config.logging.console_level)
        .with_file_level(config.logging.file_level)
        .maybe_with_log_file(
            config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string()),
        )
        .with_json_file(config.logging.json)
        .build()
}

async fn dispatch_command(cli: &cli::Cli, config: Arc<Config>) -> ExitCode {
    let result = match &cli.command {
        Some(Command::Options(args)) => run_options_command(args, &config),
        Some(Command::Validate) => {
            return match run_validate_command(&config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::from(exit::CONFIG),
            };
        }
        Some(Command::Report) => run_report_command(config).await.map(|_| ()),
        Some(Command::Cleanup) => {
            run_cleanup_command(config);
            Ok(())
        }
        Some(Command::Run) | None => {
            if let Err(e) = config.ensure_valid() {
                tracing::error!(error = %e, "invalid configuration");
                eprintln!("Error: {e}");
                return ExitCode::from(exit::CONFIG);
            }
            match run_backup_command(config).await {
                Ok(summary) if summary.cancelled => return ExitCode::from(exit::INTERRUPTED),
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Some(Command::Version | Command::Configs) => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::from(exit::SUCCESS),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(exit::FAILURE)
        }
    }
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn build_config_loader(global: &GlobalOptions) -> ConfigLoader {
    let mut loader = ConfigLoader::new();
    if !global.no_default_configs {
        loader = loader.add_default_locations();
    }
    for path in &global.configs {
        loader = loader.add_toml_file(path);
    }
    loader.with_env_prefix(ENV_PREFIX)
}

fn load_config(loader: ConfigLoader, global: &GlobalOptions) -> mirror_guard::error::Result<Config> {
    loader
        .apply_overrides(&global.to_config_overrides())?
        .build()
}
