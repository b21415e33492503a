// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Async process spawning.
//!
//! ```text
//! ProcessBuilder::which("docker")?
//!   .args() .capture_output() .maybe_timeout()
//!   .run()
//!       --> tokio::process::Command
//!           stream stdout/stderr
//!       --> ProcessOutput { exit_code, stdout, stderr }
//!        |  ProcessError::{SpawnFailed, NonZeroExit, Timeout, ...}
//! ```

pub mod builder;
mod io;
mod runner;
#[cfg(test)]
mod tests;
