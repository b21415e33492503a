// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command implementations.
//!
//! ```text
//! CLI args --> cmd::run_* handlers
//!   run, report, cleanup, config (options / validate)
//! ```

pub mod cleanup;
pub mod config;
pub mod report;
pub mod run;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// Generic failure, including a failed docker check.
    pub const FAILURE: u8 = 1;
    /// Configuration could not be loaded or did not validate.
    pub const CONFIG: u8 = 2;
    /// Stopped by Ctrl+C before every repository was processed.
    pub const INTERRUPTED: u8 = 130;
}
