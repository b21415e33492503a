// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The boundary between the engine and the git store.

use futures_util::future::BoxFuture;
use std::path::Path;

use super::Repository;
use crate::error::RepoOpsError;
use crate::utility::fs::copy::CopyMode;

/// Operations the engine needs from the git store.
///
/// Methods return `BoxFuture` so the trait stays object safe; the engine holds
/// an `Arc<dyn RepositoryOps>` and tests swap in an in-memory fake.
///
/// # Example
///
/// ```ignore
/// impl RepositoryOps for MyOps {
///     fn commit_count<'a>(&'a self, repo: &'a Repository) -> BoxFuture<'a, Result<u64, RepoOpsError>> {
///         Box::pin(async move { Ok(42) })
///     }
///     // ...
/// }
/// ```
pub trait RepositoryOps: Send + Sync {
    /// Number of commits reachable from any ref.
    fn commit_count<'a>(&'a self, repo: &'a Repository)
    -> BoxFuture<'a, Result<u64, RepoOpsError>>;

    /// Whether the repository pulls from an upstream remote.
    fn is_mirror<'a>(&'a self, repo: &'a Repository) -> BoxFuture<'a, Result<bool, RepoOpsError>>;

    /// Duplicates `src` into `dst`, hardlinks preferred.
    fn create_tree_copy<'a>(
        &'a self,
        src: &'a Path,
        dst: &'a Path,
    ) -> BoxFuture<'a, Result<CopyMode, RepoOpsError>>;

    /// Writes a full bundle of the repository to `dest`.
    fn export_bundle<'a>(
        &'a self,
        repo: &'a Repository,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), RepoOpsError>>;

    /// Disk usage of `path` in KiB.
    fn directory_size_kb<'a>(&'a self, path: &'a Path)
    -> BoxFuture<'a, Result<u64, RepoOpsError>>;
}
