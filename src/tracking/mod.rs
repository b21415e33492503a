// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Last observed commit count and size per repository.
//!
//! ```text
//! .commit_tracking   "120"
//! .size_tracking     "5321"   (KiB)
//! ```
//!
//! A missing or unreadable commit file means there is nothing to compare
//! against yet. A missing size file reads as an unknown size.


use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::RepoPaths;

/// Values recorded by the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingRecord {
    commit_count: u64,
    size_kb: Option<u64>,
}

impl TrackingRecord {
    #[must_use]
    pub const fn new(commit_count: u64, size_kb: Option<u64>) -> Self {
        Self {
            commit_count,
            size_kb,
        }
    }

    #[must_use]
    pub const fn commit_count(&self) -> u64 {
        self.commit_count
    }

    #[must_use]
    pub const fn size_kb(&self) -> Option<u64> {
        self.size_kb
    }
}

/// Reads and writes one repository's tracking files.
#[derive(Debug, Clone)]
pub struct TrackingLedger {
    commit_file: PathBuf,
    size_file: PathBuf,
}

impl TrackingLedger {
    #[must_use]
    pub fn new(paths: &RepoPaths) -> Self {
        Self {
            commit_file: paths.commit_tracking(),
            size_file: paths.size_tracking(),
        }
    }

    /// The previous record, or `None` on the first run.
    ///
    /// Corrupt data is logged and treated like a first run.
    #[must_use]
    pub fn load(&self) -> Option<TrackingRecord> {
        let text = match std::fs::read_to_string(&self.commit_file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.commit_file.display(), "no tracking record yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.commit_file.display(), error = %e, "unreadable tracking record, starting over");
                return None;
            }
        };
        let Ok(commit_count) = text.trim().parse::<u64>() else {
            warn!(path = %self.commit_file.display(), content = %text.trim(), "corrupt tracking record, starting over");
            return None;
        };
        let size_kb = std::fs::read_to_string(&self.size_file)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok());
        Some(TrackingRecord::new(commit_count, size_kb))
    }

    /// Overwrites both files. An unknown size removes the size file.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository directory or a file cannot be written.
    pub fn save(&self, record: TrackingRecord) -> Result<()> {
        if let Some(parent) = self.commit_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.commit_file, record.commit_count.to_string())
            .with_context(|| format!("failed to write {}", self.commit_file.display()))?;
        match record.size_kb {
            Some(size) => std::fs::write(&self.size_file, size.to_string())
                .with_context(|| format!("failed to write {}", self.size_file.display()))?,
            None => {
                if self.size_file.exists() {
                    std::fs::remove_file(&self.size_file)
                        .with_context(|| format!("failed to remove {}", self.size_file.display()))?;
                }
            }
        }
        Ok(())
    }
}
