// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory [`RepositoryOps`] for engine tests.

use futures_util::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Repository, RepositoryOps};
use crate::error::{ProcessError, RepoOpsError};
use crate::utility::fs::copy::{CopyMode, link_or_copy_tree};

/// Answers from tables keyed by full name; copies trees natively.
///
/// A repository without a commit count or size fails that query, which the
/// engine treats as an unknown metric.
#[derive(Debug, Default)]
pub(crate) struct FakeOps {
    commits: Mutex<HashMap<String, u64>>,
    sizes: Mutex<HashMap<PathBuf, u64>>,
    mirrors: Mutex<HashSet<String>>,
    failing_copies: Mutex<HashSet<String>>,
    fail_export: Mutex<bool>,
    exports: AtomicUsize,
}

impl FakeOps {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_commits(&self, full_name: &str, count: u64) {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(full_name.to_string(), count);
    }

    pub(crate) fn set_size(&self, path: &Path, kb: u64) {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), kb);
    }

    pub(crate) fn set_mirror(&self, full_name: &str) {
        self.mirrors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(full_name.to_string());
    }

    /// Makes tree copies whose destination mentions `needle` fail.
    pub(crate) fn fail_copy(&self, needle: &str) {
        self.failing_copies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(needle.to_string());
    }

    pub(crate) fn fail_export(&self) {
        *self.fail_export.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub(crate) fn export_calls(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

fn failed(command: &str) -> RepoOpsError {
    RepoOpsError::Process(ProcessError::NonZeroExit {
        command: command.to_string(),
        code: 128,
        stderr: "fatal: not a git repository".to_string(),
    })
}

impl RepositoryOps for FakeOps {
    fn commit_count<'a>(
        &'a self,
        repo: &'a Repository,
    ) -> BoxFuture<'a, Result<u64, RepoOpsError>> {
        Box::pin(async move {
            self.commits
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&repo.identity().full_name())
                .copied()
                .ok_or_else(|| failed("git rev-list --all --count"))
        })
    }

    fn is_mirror<'a>(&'a self, repo: &'a Repository) -> BoxFuture<'a, Result<bool, RepoOpsError>> {
        Box::pin(async move {
            Ok(self
                .mirrors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&repo.identity().full_name()))
        })
    }

    fn create_tree_copy<'a>(
        &'a self,
        src: &'a Path,
        dst: &'a Path,
    ) -> BoxFuture<'a, Result<CopyMode, RepoOpsError>> {
        Box::pin(async move {
            let dst_text = dst.display().to_string();
            let fails = self
                .failing_copies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|needle| dst_text.contains(needle.as_str()));
            if fails {
                // Leave a partial tree behind, like an interrupted copy would.
                let _ = std::fs::create_dir_all(dst);
                return Err(RepoOpsError::CopyFailed {
                    src: src.display().to_string(),
                    dst: dst_text,
                    source: std::io::Error::other("disk full"),
                });
            }
            link_or_copy_tree(src, dst)
                .await
                .map_err(|source| RepoOpsError::CopyFailed {
                    src: src.display().to_string(),
                    dst: dst_text,
                    source,
                })
        })
    }

    fn export_bundle<'a>(
        &'a self,
        repo: &'a Repository,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), RepoOpsError>> {
        Box::pin(async move {
            self.exports.fetch_add(1, Ordering::SeqCst);
            if *self.fail_export.lock().unwrap_or_else(PoisonError::into_inner) {
                std::fs::write(dest, b"partial").ok();
                return Err(failed("git bundle create"));
            }
            std::fs::write(dest, format!("bundle of {}\n", repo.identity()))
                .map_err(|source| RepoOpsError::CopyFailed {
                    src: repo.path().display().to_string(),
                    dst: dest.display().to_string(),
                    source,
                })
        })
    }

    fn directory_size_kb<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<u64, RepoOpsError>> {
        Box::pin(async move {
            self.sizes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(path)
                .copied()
                .ok_or_else(|| RepoOpsError::SizeFailed {
                    path: path.display().to_string(),
                    message: "no size recorded".to_string(),
                })
        })
    }
}
