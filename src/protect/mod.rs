// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Protection markers.
//!
//! A protected snapshot or report is never deleted by retention. The marker
//! is a plain file whose presence is the whole state; its contents are a
//! commented reason trail for whoever finds it.
//!
//! ```text
//! Snapshot(dir)         -->  <dir>/.protected
//! Report(file.md)       -->  <file.md>.protected
//! Archive(file.bundle)  -->  <file.bundle>.protected
//! ```
//!
//! Nothing in this crate removes a marker. Revoking protection is done by
//! hand.

#[cfg(test)]
mod tests;

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::layout::{PROTECTED_MARKER, PROTECTED_SUFFIX};

const MARKED_AT_PREFIX: &str = "# Marked at: ";
const REPOSITORY_PREFIX: &str = "# Repository: ";
const REPORT_PREFIX: &str = "# Report: ";
const REASON_PREFIX: &str = "#   - ";

/// Something that can carry a protection marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectTarget<'a> {
    /// A snapshot directory.
    Snapshot(&'a Path),
    /// A report file.
    Report(&'a Path),
    /// A monthly archive bundle.
    Archive(&'a Path),
}

impl ProtectTarget<'_> {
    /// Path of the marker file for this target.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        match self {
            Self::Snapshot(dir) => dir.join(PROTECTED_MARKER),
            Self::Report(file) | Self::Archive(file) => {
                let mut name = file.as_os_str().to_os_string();
                name.push(PROTECTED_SUFFIX);
                PathBuf::from(name)
            }
        }
    }

    fn render(&self, subject: &str, reasons: &[String], marked_at: DateTime<Local>) -> String {
        let mut out = String::new();
        let (title, reason, subject_prefix, list_title) = match self {
            Self::Snapshot(_) => (
                "# Snapshot marked for permanent retention",
                "# Reason: last known-good state before an anomaly",
                REPOSITORY_PREFIX,
                "# Anomalies detected after this snapshot:",
            ),
            Self::Report(_) => (
                "# Report marked for permanent retention",
                "# Reason: repositories raised alerts during this run",
                REPORT_PREFIX,
                "# Repositories needing review:",
            ),
            Self::Archive(_) => (
                "# Archive marked for permanent retention",
                "# Reason: kept on request",
                REPOSITORY_PREFIX,
                "# Notes:",
            ),
        };

        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{reason}");
        let _ = writeln!(out, "{MARKED_AT_PREFIX}{}", marked_at.to_rfc3339());
        let _ = writeln!(out, "{subject_prefix}{subject}");
        let _ = writeln!(out, "#");
        let _ = writeln!(out, "{list_title}");
        for r in reasons {
            let _ = writeln!(out, "{REASON_PREFIX}{r}");
        }
        let _ = writeln!(out, "#");
        if matches!(self, Self::Snapshot(_)) {
            let _ = writeln!(
                out,
                "# This snapshot holds the pre-anomaly state and is safe to restore."
            );
        }
        let _ = writeln!(out, "# Delete this file to revoke protection.");
        out
    }
}

/// A parsed marker file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionMarker {
    reasons: Vec<String>,
    marked_at: Option<String>,
    subject: Option<String>,
}

impl ProtectionMarker {
    /// Reads a marker back from its text. Unknown lines are ignored, so
    /// hand-written markers parse to an empty trail.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut marker = Self::default();
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix(REASON_PREFIX) {
                marker.reasons.push(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix(MARKED_AT_PREFIX) {
                marker.marked_at = Some(rest.trim().to_string());
            } else if let Some(rest) = line
                .strip_prefix(REPOSITORY_PREFIX)
                .or_else(|| line.strip_prefix(REPORT_PREFIX))
            {
                marker.subject = Some(rest.trim().to_string());
            }
        }
        marker
    }

    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    #[must_use]
    pub fn marked_at(&self) -> Option<&str> {
        self.marked_at.as_deref()
    }

    /// Repository name or report file the marker was written for.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

/// Writes the marker for `target`, replacing any previous one.
///
/// Calling this twice only refreshes the reason trail and timestamp.
///
/// # Errors
///
/// Returns the I/O error if the marker cannot be written.
pub fn protect(
    target: ProtectTarget<'_>,
    subject: &str,
    reasons: &[String],
    marked_at: DateTime<Local>,
) -> io::Result<PathBuf> {
    let path = target.marker_path();
    std::fs::write(&path, target.render(subject, reasons, marked_at))?;
    info!(marker = %path.display(), reasons = reasons.len(), "protection marker written");
    Ok(path)
}

/// True if `target` carries a marker.
#[must_use]
pub fn is_protected(target: ProtectTarget<'_>) -> bool {
    target.marker_path().is_file()
}

/// Parses the marker of `target`, if there is one.
#[must_use]
pub fn read(target: ProtectTarget<'_>) -> Option<ProtectionMarker> {
    std::fs::read_to_string(target.marker_path())
        .ok()
        .map(|text| ProtectionMarker::parse(&text))
}
