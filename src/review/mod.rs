// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The process-wide "needs review" queue.
//!
//! Backed by `<root>/.need_review`, one full name per line, so entries
//! survive a crash between the alert and the report. Appends from parallel
//! repository pipelines go through one mutex; the report drains the file
//! once after all pipelines have joined.
//!
//! ```text
//! enqueue() --append--> .need_review
//!                            |  claim(): rename (merged into an older claim)
//!                            v
//!                      .need_review.claimed --settle()--> removed
//! ```
//!
//! A report claims the queue before rendering and settles it only once the
//! report is protected. Entries appended by another process after the
//! rename land in a fresh `.need_review` and wait for the next report. An
//! unsettled claim is picked up again by the next `claim()`.


use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use tracing::debug;

use crate::error::Result;
use crate::repo::RepositoryIdentity;

/// Append-only queue of repositories with unreviewed alerts.
#[derive(Debug)]
pub struct ReviewQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReviewQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<queue>.claimed`, where entries wait while a report is written.
    #[must_use]
    pub fn claimed_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".claimed");
        PathBuf::from(name)
    }

    /// Appends `repo` to the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue file cannot be opened or written.
    pub fn enqueue(&self, repo: &RepositoryIdentity) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{}", repo.full_name())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        debug!(repo = %repo, "queued for review");
        Ok(())
    }

    /// Queued repositories in first-seen order, without duplicates.
    /// Claimed but unsettled entries come first.
    #[must_use]
    pub fn entries(&self) -> Vec<RepositoryIdentity> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = read_entries(&self.claimed_path());
        for identity in read_entries(&self.path) {
            if !entries.contains(&identity) {
                entries.push(identity);
            }
        }
        entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Moves the queue aside and returns everything claimed so far.
    ///
    /// The pending file is renamed in one step, so an entry is either in
    /// the returned list or still pending. A claim left over from an
    /// earlier report that was never settled is merged in first.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending file cannot be moved or merged.
    pub fn claim(&self) -> Result<Vec<RepositoryIdentity>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let claimed = self.claimed_path();

        if claimed.exists() {
            let mut incoming = claimed.as_os_str().to_os_string();
            incoming.push(".incoming");
            let incoming = PathBuf::from(incoming);
            // A leftover from an interrupted merge goes first.
            if incoming.exists() {
                merge_into(&incoming, &claimed)?;
            }
            if rename_if_present(&self.path, &incoming)? {
                merge_into(&incoming, &claimed)?;
            }
        } else {
            rename_if_present(&self.path, &claimed)?;
        }

        let entries = read_entries(&claimed);
        if !entries.is_empty() {
            debug!(count = entries.len(), "review queue claimed");
        }
        Ok(entries)
    }

    /// Forgets the claimed entries. Call once the report that lists them
    /// is safely protected.
    ///
    /// # Errors
    ///
    /// Returns an error if the claim file exists but cannot be removed.
    pub fn settle(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let claimed = self.claimed_path();
        match std::fs::remove_file(&claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to settle {}", claimed.display()));
            }
        }
        Ok(())
    }
}

/// Renames `from` to `to`; `false` when there was nothing to move.
fn rename_if_present(from: &Path, to: &Path) -> Result<bool> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to move {}", from.display())),
    }
}

/// Appends `from` to `into`, then removes `from`.
fn merge_into(from: &Path, into: &Path) -> Result<()> {
    let text = std::fs::read(from).with_context(|| format!("failed to read {}", from.display()))?;
    std::fs::OpenOptions::new()
        .append(true)
        .open(into)
        .and_then(|mut file| file.write_all(&text))
        .with_context(|| format!("failed to merge into {}", into.display()))?;
    std::fs::remove_file(from).with_context(|| format!("failed to remove {}", from.display()))
}

fn read_entries(path: &Path) -> Vec<RepositoryIdentity> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    for identity in text.lines().filter_map(RepositoryIdentity::parse) {
        if !seen.contains(&identity) {
            seen.push(identity);
        }
    }
    seen
}
