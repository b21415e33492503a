// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Repositories on the git server and the operations the engine needs on them.
//!
//! ```text
//! <data_volume>/<repos_path>/
//!   <owner>/<name>.git     --> Repository { identity: owner/name, path }
//!
//! RepositoryOps (trait, BoxFuture methods)
//!   commit_count  is_mirror  create_tree_copy  export_bundle  directory_size_kb
//!        |
//!        v
//!   ContainerOps   docker exec / docker cp + native copy and size
//! ```

pub mod container;
pub mod ops;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::error::Result;

pub use container::ContainerOps;
pub use ops::RepositoryOps;

/// `(owner, name)` of a repository, the key for all per-repository state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryIdentity {
    owner: String,
    name: String,
}

impl RepositoryIdentity {
    /// Creates an identity. A trailing `.git` on `name` is stripped.
    pub fn new(owner: impl Into<String>, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Self {
            owner: owner.into(),
            name: name.strip_suffix(".git").unwrap_or(name).to_string(),
        }
    }

    /// Parses `owner/name`.
    #[must_use]
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    identity: RepositoryIdentity,
    path: PathBuf,
}

impl Repository {
    #[must_use]
    pub const fn new(identity: RepositoryIdentity, path: PathBuf) -> Self {
        Self { identity, path }
    }

    #[must_use]
    pub const fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    /// Host path of the bare repository directory (`<owner>/<name>.git`).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name on disk, including the `.git` suffix.
    #[must_use]
    pub fn dir_name(&self) -> String {
        self.path.file_name().map_or_else(
            || format!("{}.git", self.identity.name()),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

/// Lists `<owner>/<name>.git` directories under `repos_dir`, sorted by identity.
///
/// A missing `repos_dir` yields an empty list.
///
/// # Errors
///
/// Returns an error if `repos_dir` or an owner directory cannot be read.
pub fn discover(repos_dir: &Path) -> Result<Vec<Repository>> {
    if !repos_dir.is_dir() {
        debug!(path = %repos_dir.display(), "repository root does not exist");
        return Ok(Vec::new());
    }

    let mut repos = Vec::new();
    for owner in sorted_dirs(repos_dir)? {
        let Some(owner_name) = owner.file_name().and_then(|n| n.to_str()).map(String::from)
        else {
            continue;
        };
        if owner_name.starts_with('.') {
            continue;
        }
        for repo_dir in sorted_dirs(&owner)? {
            let Some(dir_name) = repo_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !dir_name.ends_with(".git") || dir_name == ".git" {
                continue;
            }
            let identity = RepositoryIdentity::new(owner_name.clone(), dir_name);
            repos.push(Repository::new(identity, repo_dir.clone()));
        }
    }

    repos.sort_by(|a, b| a.identity.cmp(&b.identity));
    debug!(count = repos.len(), path = %repos_dir.display(), "discovered repositories");
    Ok(repos)
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}
