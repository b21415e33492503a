// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use futures_util::future::BoxFuture;
use mirror_guard::config::Config;
use mirror_guard::error::{ProcessError, RepoOpsError};
use mirror_guard::orchestrator::{BackupOrchestrator, RunContext, RunSummary};
use mirror_guard::repo::{Repository, RepositoryIdentity, RepositoryOps};
use mirror_guard::utility::fs::copy::{CopyMode, link_or_copy_tree};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const DAY: Duration = Duration::from_secs(86_400);

/// A git store whose answers are set by the test.
#[derive(Debug, Default)]
pub struct ScriptedOps {
    commits: Mutex<HashMap<String, u64>>,
    sizes: Mutex<HashMap<PathBuf, u64>>,
    exports: AtomicUsize,
}

impl ScriptedOps {
    pub fn set_commits(&self, full_name: &str, count: u64) {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(full_name.to_string(), count);
    }

    pub fn set_size(&self, repo: &Repository, kb: u64) {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.path().to_path_buf(), kb);
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

impl RepositoryOps for ScriptedOps {
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
                .ok_or_else(|| {
                    RepoOpsError::Process(ProcessError::NonZeroExit {
                        command: "git rev-list --all --count".to_string(),
                        code: 128,
                        stderr: String::new(),
                    })
                })
        })
    }

    fn is_mirror<'a>(&'a self, _repo: &'a Repository) -> BoxFuture<'a, Result<bool, RepoOpsError>> {
        Box::pin(async { Ok(true) })
    }

    fn create_tree_copy<'a>(
        &'a self,
        src: &'a Path,
        dst: &'a Path,
    ) -> BoxFuture<'a, Result<CopyMode, RepoOpsError>> {
        Box::pin(async move {
            link_or_copy_tree(src, dst)
                .await
                .map_err(|source| RepoOpsError::CopyFailed {
                    src: src.display().to_string(),
                    dst: dst.display().to_string(),
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
            std::fs::write(dest, format!("bundle of {}\n", repo.identity())).map_err(|source| {
                RepoOpsError::CopyFailed {
                    src: repo.path().display().to_string(),
                    dst: dest.display().to_string(),
                    source,
                }
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
                    message: "unknown".to_string(),
                })
        })
    }
}

/// A scratch server volume and backup root.
pub struct Site {
    pub temp: TempDir,
    pub config: Config,
    pub ops: Arc<ScriptedOps>,
}

impl Site {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.gitea.data_volume = temp.path().join("gitea");
        config.backup.root = temp.path().join("backup");
        config.advanced.verify_docker = false;
        std::fs::create_dir_all(config.repos_dir()).unwrap();
        Self {
            temp,
            config,
            ops: Arc::new(ScriptedOps::default()),
        }
    }

    /// Creates `<repos_dir>/<owner>/<name>.git` with a few files.
    pub fn add_repo(&self, owner: &str, name: &str) -> Repository {
        let path = self.config.repos_dir().join(owner).join(format!("{name}.git"));
        std::fs::create_dir_all(path.join("objects/pack")).unwrap();
        std::fs::write(path.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(path.join("objects/pack/pack-1.pack"), vec![7u8; 4096]).unwrap();
        Repository::new(RepositoryIdentity::new(owner, name), path)
    }

    pub async fn run(&self, repos: Vec<Repository>) -> RunSummary {
        let ctx = RunContext::new(Arc::new(self.config.clone()), CancellationToken::new());
        let ops: Arc<dyn RepositoryOps> = self.ops.clone();
        BackupOrchestrator::new(Arc::new(ctx), ops)
            .run_once(repos)
            .await
    }
}

/// Sets the modification time of `path` to `age` ago.
pub fn age(path: &Path, age: Duration) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - age)
        .unwrap();
}

/// `<path>.protected`.
pub fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".protected");
    PathBuf::from(name)
}
