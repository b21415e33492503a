// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!                        main.rs
//!                           |
//!                +----------+----------+
//!                v                     v
//!             cli (clap)          cmd (handlers)
//!                |        run / report / cleanup / options
//!                +----------+----------+
//!                           v
//!              ,---------------------------,
//!              |          config           |
//!              |   TOML, env, --set        |
//!              '-------------+-------------'
//!                            v
//!                      orchestrator
//!             (per repository, N at a time)
//!                            |
//!     +--------+--------+----+----+----------+---------+
//!     v        v        v         v          v         v
//!  snapshot tracking  detect   protect   retention  archive
//!     |                 |                              |
//!     |               review --------> report          |
//!     +--------------------+-----------------------------+
//!                          v
//!                   repo (RepositoryOps)
//!               docker exec / native copy
//!
//!   +-----------------------------------------+
//!   |  core      process builder / runner     |
//!   +-----------------------------------------+
//!   |  foundation  error, logging, layout,    |
//!   |              utility                    |
//!   +-----------------------------------------+
//! ```

pub mod archive;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod core;
pub mod detect;
pub mod error;
pub mod layout;
pub mod logging;
pub mod orchestrator;
pub mod protect;
pub mod repo;
pub mod report;
pub mod retention;
pub mod review;
pub mod snapshot;
pub mod tracking;
pub mod utility;
