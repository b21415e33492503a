// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Point-in-time copies of one repository.
//!
//! ```text
//! create(repo)
//!   snapshots/<id>/          <- ops.create_tree_copy (hardlinks, copy fallback)
//!   commit count             <- ops.commit_count (unknown on failure)
//!   <id>/.snapshot_meta      <- written last, marks the snapshot complete
//!
//! enumerate()   newest first by modification time, id breaks ties
//! previous(x)   the complete snapshot right after x in that order,
//!               or the newest complete one when x is None
//! ```
//!
//! The modification time of a complete snapshot is the mtime of its
//! metadata file, which is never touched after creation. Writing a
//! protection marker bumps the directory mtime but leaves the order alone.


use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::layout::{RepoPaths, SNAPSHOT_META_FILE};
use crate::protect::{self, ProtectTarget};
use crate::repo::{Repository, RepositoryOps};

/// Snapshot id format, also the directory name.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y%m%d-%H%M%S";

const UNKNOWN: &str = "unknown";

/// Contents of `.snapshot_meta` (`key=value` lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    timestamp: String,
    source: String,
    repo_name: String,
    commit_count: Option<u64>,
}

impl SnapshotMeta {
    #[must_use]
    pub fn new(
        timestamp: DateTime<Local>,
        source: &Path,
        repo_name: impl Into<String>,
        commit_count: Option<u64>,
    ) -> Self {
        Self {
            timestamp: timestamp.to_rfc3339(),
            source: source.display().to_string(),
            repo_name: repo_name.into(),
            commit_count,
        }
    }

    /// Parses the `key=value` form. Unknown keys are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut meta = Self {
            timestamp: String::new(),
            source: String::new(),
            repo_name: String::new(),
            commit_count: None,
        };
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "timestamp" => meta.timestamp = value.to_string(),
                "source" => meta.source = value.to_string(),
                "repo_name" => meta.repo_name = value.to_string(),
                "commit_count" => meta.commit_count = value.parse().ok(),
                _ => {}
            }
        }
        meta
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "timestamp={}", self.timestamp);
        let _ = writeln!(out, "source={}", self.source);
        let _ = writeln!(out, "repo_name={}", self.repo_name);
        match self.commit_count {
            Some(count) => {
                let _ = writeln!(out, "commit_count={count}");
            }
            None => {
                let _ = writeln!(out, "commit_count={UNKNOWN}");
            }
        }
        out
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// `None` when the count could not be queried at creation time.
    #[must_use]
    pub const fn commit_count(&self) -> Option<u64> {
        self.commit_count
    }
}

/// One snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    id: String,
    path: PathBuf,
    commit_count: Option<u64>,
    created_at: Option<DateTime<FixedOffset>>,
    modified: SystemTime,
    complete: bool,
    protected: bool,
}

impl Snapshot {
    /// Reads a snapshot directory. Returns `None` if `dir` is not a directory.
    #[must_use]
    pub fn load(dir: &Path) -> Option<Self> {
        let dir_meta = std::fs::metadata(dir).ok()?;
        if !dir_meta.is_dir() {
            return None;
        }
        let id = dir.file_name()?.to_string_lossy().into_owned();
        let meta_path = dir.join(SNAPSHOT_META_FILE);

        let (meta, modified) = match std::fs::read_to_string(&meta_path) {
            Ok(text) => {
                let modified = std::fs::metadata(&meta_path)
                    .and_then(|m| m.modified())
                    .ok();
                (Some(SnapshotMeta::parse(&text)), modified)
            }
            Err(_) => (None, None),
        };
        let modified = modified
            .or_else(|| dir_meta.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Some(Self {
            id,
            path: dir.to_path_buf(),
            commit_count: meta.as_ref().and_then(SnapshotMeta::commit_count),
            created_at: meta
                .as_ref()
                .and_then(|m| DateTime::parse_from_rfc3339(m.timestamp()).ok()),
            modified,
            complete: meta.is_some(),
            protected: protect::is_protected(ProtectTarget::Snapshot(dir)),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn commit_count(&self) -> Option<u64> {
        self.commit_count
    }

    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created_at
    }

    /// Ordering and retention key.
    #[must_use]
    pub const fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Whether the metadata record exists. Incomplete snapshots are
    /// leftovers of an interrupted or failed run.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether a protection marker was present when this was loaded.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.protected
    }
}

/// Creates and lists snapshots for one repository.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(paths: &RepoPaths) -> Self {
        Self {
            root: paths.snapshots(),
        }
    }

    /// The `snapshots/` directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `repo` into a new snapshot named after `now`.
    ///
    /// An unknown commit count is recorded as `unknown`; only a failed copy
    /// or metadata write fails the snapshot. Whatever was written of a
    /// failed snapshot is removed best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the directory cannot be created, the tree
    /// copy fails, or the metadata cannot be written.
    pub async fn create(
        &self,
        repo: &Repository,
        ops: &dyn RepositoryOps,
        now: DateTime<Local>,
    ) -> Result<Snapshot, SnapshotError> {
        let full_name = repo.identity().full_name();
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| SnapshotError::DirectoryFailed {
                path: self.root.display().to_string(),
                source,
            })?;

        let id = self.unique_id(now);
        let path = self.root.join(&id);
        debug!(repo = %full_name, snapshot = %id, "creating snapshot");

        let mode = match ops.create_tree_copy(repo.path(), &path).await {
            Ok(mode) => mode,
            Err(source) => {
                discard_partial(&path).await;
                return Err(SnapshotError::CopyFailed {
                    repo: full_name,
                    source,
                });
            }
        };

        let commit_count = match ops.commit_count(repo).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(repo = %full_name, error = %e, "commit count unavailable, recording unknown");
                None
            }
        };

        let meta = SnapshotMeta::new(now, repo.path(), full_name.as_str(), commit_count);
        let meta_path = path.join(SNAPSHOT_META_FILE);
        if let Err(source) = tokio::fs::write(&meta_path, meta.render()).await {
            discard_partial(&path).await;
            return Err(SnapshotError::MetadataFailed {
                path: meta_path.display().to_string(),
                source,
            });
        }

        let snapshot = Snapshot::load(&path).ok_or_else(|| SnapshotError::MetadataFailed {
            path: meta_path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot vanished"),
        })?;

        info!(
            repo = %full_name,
            snapshot = %id,
            mode = mode.as_str(),
            commits = commit_count.map_or_else(|| UNKNOWN.to_string(), |c| c.to_string()),
            "snapshot created"
        );
        Ok(snapshot)
    }

    /// All snapshot directories, newest first. Missing root yields nothing.
    #[must_use]
    pub fn enumerate(&self) -> Vec<Snapshot> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut snapshots: Vec<Snapshot> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| Snapshot::load(&entry.path()))
            .collect();
        snapshots.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.id.cmp(&a.id)));
        snapshots
    }

    /// The newest complete snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<Snapshot> {
        self.previous(None)
    }

    /// The complete snapshot immediately older than `current`, or the
    /// newest complete one when `current` is `None`.
    ///
    /// Returns `None` if `current` is the oldest or is not in this store.
    #[must_use]
    pub fn previous(&self, current: Option<&Snapshot>) -> Option<Snapshot> {
        let mut complete = self.enumerate().into_iter().filter(Snapshot::is_complete);
        match current {
            None => complete.next(),
            Some(current) => {
                let mut iter = complete.skip_while(|s| s.path != current.path);
                iter.next()?;
                iter.next()
            }
        }
    }

    fn unique_id(&self, now: DateTime<Local>) -> String {
        let base = now.format(SNAPSHOT_ID_FORMAT).to_string();
        if !self.root.join(&base).exists() {
            return base;
        }
        (1..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.root.join(candidate).exists())
            .unwrap_or(base)
    }
}

async fn discard_partial(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false)
        && let Err(e) = tokio::fs::remove_dir_all(path).await
    {
        warn!(path = %path.display(), error = %e, "failed to remove partial snapshot");
    }
}
