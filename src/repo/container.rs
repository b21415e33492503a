// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! [`RepositoryOps`] backed by the git server's container.
//!
//! ```text
//! commit_count   docker exec -u <user> <container> git -C <path> rev-list --all --count
//! is_mirror      docker exec ... git -C <path> config --get remote.origin.url
//! export_bundle  docker exec ... git -C <path> bundle create /tmp/<tmp> --all
//!                docker cp <container>:/tmp/<tmp> <dest>
//!                docker exec <container> rm -f /tmp/<tmp>     (always)
//! tree copy      native hardlinks, byte copy across filesystems
//! size           native walk, each inode once
//! ```

use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Repository, RepositoryOps};
use crate::config::types::GiteaConfig;
use crate::core::process::builder::{ProcessBuilder, ProcessFlags};
use crate::error::RepoOpsError;
use crate::utility::fs::copy::{CopyMode, link_or_copy_tree};
use crate::utility::fs::walk::directory_size_kb;

/// Talks to the repositories through `docker exec`.
#[derive(Debug, Clone)]
pub struct ContainerOps {
    docker: PathBuf,
    container: String,
    git_user: String,
    container_repos_path: String,
    timeout: Option<Duration>,
}

impl ContainerOps {
    #[must_use]
    pub fn new(gitea: &GiteaConfig) -> Self {
        Self {
            docker: PathBuf::from("docker"),
            container: gitea.docker_container.clone(),
            git_user: gitea.docker_git_user.clone(),
            container_repos_path: gitea.container_repos_path.trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    /// Uses a specific docker executable instead of the one on PATH.
    #[must_use]
    pub fn with_docker_program(mut self, docker: impl Into<PathBuf>) -> Self {
        self.docker = docker.into();
        self
    }

    /// Applies a timeout to every external command.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Path of `repo` as seen from inside the container.
    #[must_use]
    pub fn container_path(&self, repo: &Repository) -> String {
        format!(
            "{}/{}/{}",
            self.container_repos_path,
            repo.identity().owner(),
            repo.dir_name()
        )
    }

    fn docker(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.docker)
            .name("docker")
            .maybe_timeout(self.timeout)
    }

    /// `docker exec -u <user> <container> git -C <path> <args...>`.
    #[must_use]
    pub fn git(&self, repo: &Repository, args: &[&str]) -> ProcessBuilder {
        self.docker()
            .args([
                "exec",
                "-u",
                self.git_user.as_str(),
                self.container.as_str(),
                "git",
                "-C",
            ])
            .arg(self.container_path(repo))
            .args(args)
    }

    /// Checks that docker is installed and the container is running.
    ///
    /// # Errors
    ///
    /// Returns `RepoOpsError::Process` if docker cannot be found or run, and
    /// `RepoOpsError::ContainerNotRunning` if the container is not listed.
    pub async fn verify(&self) -> Result<(), RepoOpsError> {
        if self.docker == Path::new("docker") {
            ProcessBuilder::which("docker")?;
        }

        let output = self
            .docker()
            .args(["ps", "--format", "{{.Names}}"])
            .capture_output()
            .run()
            .await?;

        if output
            .stdout()
            .lines()
            .any(|name| name.trim() == self.container)
        {
            debug!(container = %self.container, "container is running");
            Ok(())
        } else {
            Err(RepoOpsError::ContainerNotRunning {
                container: self.container.clone(),
            })
        }
    }

    async fn remove_container_file(&self, path: &str) {
        let result = self
            .docker()
            .args(["exec", self.container.as_str(), "rm", "-f", path])
            .capture_output()
            .flag(ProcessFlags::IGNORE_OUTPUT_ON_FAILURE)
            .run()
            .await;
        if let Err(e) = result {
            warn!(container = %self.container, path = %path, error = %e, "failed to remove temporary bundle");
        }
    }
}

impl RepositoryOps for ContainerOps {
    fn commit_count<'a>(
        &'a self,
        repo: &'a Repository,
    ) -> BoxFuture<'a, Result<u64, RepoOpsError>> {
        Box::pin(async move {
            let builder = self.git(repo, &["rev-list", "--all", "--count"]);
            let command = builder.command_line();
            let output = builder.capture_output().run().await?;
            let text = output.stdout().trim();
            text.parse::<u64>()
                .map_err(|_| RepoOpsError::UnexpectedOutput {
                    command,
                    output: text.to_string(),
                })
        })
    }

    fn is_mirror<'a>(&'a self, repo: &'a Repository) -> BoxFuture<'a, Result<bool, RepoOpsError>> {
        Box::pin(async move {
            // `git config --get` exits 1 when the key is unset.
            let output = self
                .git(repo, &["config", "--get", "remote.origin.url"])
                .capture_output()
                .success_codes([0, 1])
                .run()
                .await?;
            Ok(output.success() && !output.stdout().trim().is_empty())
        })
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
            let identity = repo.identity();
            let tmp = format!(
                "/tmp/mirror-guard-{}-{}-{}.bundle",
                identity.owner(),
                identity.name(),
                std::process::id()
            );

            let created = self
                .git(repo, &["bundle", "create", tmp.as_str(), "--all"])
                .capture_output()
                .run()
                .await;

            let copied = match created {
                Ok(_) => self
                    .docker()
                    .arg("cp")
                    .arg(format!("{}:{tmp}", self.container))
                    .arg(dest)
                    .capture_output()
                    .run()
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };

            self.remove_container_file(&tmp).await;
            copied.map_err(RepoOpsError::from)
        })
    }

    fn directory_size_kb<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<u64, RepoOpsError>> {
        Box::pin(async move {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || directory_size_kb(owned))
                .await
                .map_err(|e| RepoOpsError::SizeFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
                .map_err(|e| RepoOpsError::SizeFailed {
                    path: path.display().to_string(),
                    message: format!("{e:#}"),
                })
        })
    }
}
