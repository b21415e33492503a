// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Parallel traversal of backup and repository trees.

use crate::error::Result;
use bon::Builder;
use flume::unbounded;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Which entries a walk visits.
///
/// The default skips dot-files and honors ignore files, which suits listing
/// archives and reports. [`WalkOptions::everything`] is for measuring.
#[derive(Debug, Clone, Builder)]
pub struct WalkOptions {
    /// Include hidden files/directories
    #[builder(setters(name = with_include_hidden), default = false)]
    include_hidden: bool,
    /// Respect .gitignore files
    #[builder(setters(name = with_respect_gitignore), default = true)]
    respect_gitignore: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WalkOptions {
    #[must_use]
    pub const fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    #[must_use]
    pub const fn respect_gitignore(&self) -> bool {
        self.respect_gitignore
    }

    /// Every entry, hidden or ignored. Used for measuring git stores where
    /// `.gitignore` rules and dot-files are data, not noise.
    #[must_use]
    pub fn everything() -> Self {
        Self::builder()
            .with_include_hidden(true)
            .with_respect_gitignore(false)
            .build()
    }
}

/// Builds a `WalkBuilder` with the given options.
pub(super) fn build_walker(root: &Path, options: &WalkOptions) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder.follow_links(false);
    builder.hidden(!options.include_hidden());

    builder.git_ignore(options.respect_gitignore());
    builder.git_global(options.respect_gitignore());
    builder.git_exclude(options.respect_gitignore());
    builder.ignore(options.respect_gitignore());
    builder.parents(options.respect_gitignore());
    builder
}

/// Performs parallel directory traversal with a callback for each file.
///
/// # Returns
/// Number of files processed, or an error.
///
/// # Errors
///
/// Returns an error if the root directory does not exist.
pub fn parallel_walk_with_callback<P, F>(
    root: P,
    options: &WalkOptions,
    callback: F,
) -> Result<usize>
where
    P: AsRef<Path>,
    F: Fn(&ignore::DirEntry) + Send + Sync,
{
    let root = root.as_ref();

    if !root.exists() {
        anyhow::bail!("root directory does not exist: {}", root.display());
    }

    let callback = Arc::new(callback);
    let count = Arc::new(AtomicUsize::new(0));

    build_walker(root, options).build_parallel().run(|| {
        let callback = Arc::clone(&callback);
        let count = Arc::clone(&count);

        Box::new(move |entry_result| {
            match entry_result {
                Ok(entry) => {
                    callback(&entry);
                    count.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!(error = %e, "walk error"),
            }
            ignore::WalkState::Continue
        })
    });

    Ok(count.load(Ordering::Relaxed))
}

/// Disk usage of a tree in KiB, like `du -sk`.
///
/// Every inode is counted once, so a snapshot made of hardlinks into an
/// already-measured tree adds nothing. Directories count towards the total.
///
/// # Errors
///
/// Returns an error if the root directory does not exist.
pub fn directory_size_kb<P: AsRef<Path>>(root: P) -> Result<u64> {
    let bytes = AtomicU64::new(0);
    let seen: Mutex<HashSet<(u64, u64)>> = Mutex::new(HashSet::new());

    parallel_walk_with_callback(root, &WalkOptions::everything(), |entry| {
        let Ok(meta) = std::fs::symlink_metadata(entry.path()) else {
            return;
        };
        if let Some(key) = inode_key(&meta)
            && !seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key)
        {
            return;
        }
        bytes.fetch_add(allocated_bytes(&meta), Ordering::Relaxed);
    })?;

    Ok(bytes.load(Ordering::Relaxed).div_ceil(1024))
}

#[cfg(unix)]
fn inode_key(meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
const fn inode_key(_meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    None
}

#[cfg(unix)]
fn allocated_bytes(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.blocks() * 512
}

#[cfg(not(unix))]
fn allocated_bytes(meta: &std::fs::Metadata) -> u64 {
    meta.len()
}

/// Finds files matching a glob pattern using parallel traversal.
///
/// The pattern is matched against the path relative to `root`.
///
/// # Errors
///
/// Returns an error if:
/// - The root directory does not exist.
/// - The glob pattern is invalid.
///
/// # Example
/// ```no_run
/// use mirror_guard::utility::fs::walk::find_files;
///
/// let bundles = find_files("/opt/backup/acme/tools/archives", "archive-*.bundle")?;
/// for file in bundles {
///     println!("{}", file.display());
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn find_files<P: AsRef<Path>>(root: P, pattern: &str) -> Result<Vec<PathBuf>> {
    use wax::{Glob, Program};

    let root = root.as_ref();

    if !root.exists() {
        anyhow::bail!("root directory does not exist: {}", root.display());
    }

    let glob =
        Glob::new(pattern).map_err(|e| anyhow::anyhow!("invalid glob pattern '{pattern}': {e}"))?;

    let (tx, rx) = unbounded::<PathBuf>();
    let glob = Arc::new(glob);
    let root_path = root.to_path_buf();

    build_walker(root, &WalkOptions::default())
        .build_parallel()
        .run(|| {
            let tx = tx.clone();
            let glob = Arc::clone(&glob);
            let root_path = root_path.clone();

            Box::new(move |entry_result| {
                if let Ok(entry) = entry_result
                    && entry.file_type().is_some_and(|ft| ft.is_file())
                    && let Ok(rel_path) = entry.path().strip_prefix(&root_path)
                    && glob.is_match(rel_path)
                {
                    let _ = tx.send(entry.path().to_path_buf());
                }
                ignore::WalkState::Continue
            })
        });

    drop(tx);
    let mut files: Vec<PathBuf> = rx.iter().collect();
    files.sort();
    Ok(files)
}
