// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core modules.
//!
//! ```text
//!    core
//!     |
//!     v
//!  process
//!     |
//!  Builder, Output, timeout
//! ```

pub mod process;
