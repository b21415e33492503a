// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tree duplication: hardlinks first, byte copy as the cross-device fallback.
//! Also the mode applied to files published into the backup tree.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Mode of archives and reports once they are renamed into place.
///
/// Temporary files start out owner-only; the dashboard and restore tooling
/// may run as another user.
#[cfg(unix)]
pub const PUBLISHED_FILE_MODE: u32 = 0o644;

/// Applies [`PUBLISHED_FILE_MODE`] to a finished file. No-op off unix.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn publish_mode(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(PUBLISHED_FILE_MODE))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// How a tree copy was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Every file is a hardlink to the source inode.
    Hardlinked,
    /// Source and destination are on different filesystems; bytes were copied.
    FullCopy,
}

impl CopyMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hardlinked => "hardlink",
            Self::FullCopy => "copy",
        }
    }
}

/// Duplicates `src` into `dst`, preferring hardlinks.
///
/// Falls back to [`copy_dir_contents_async`] only when linking fails with
/// `CrossesDevices`; the partial link tree is removed first. Any other error
/// is returned as is and the caller owns cleanup of `dst`.
///
/// # Errors
///
/// Returns the first I/O error that is not a cross-device link failure, or
/// the error of the fallback copy.
pub async fn link_or_copy_tree(src: &Path, dst: &Path) -> io::Result<CopyMode> {
    match link_tree_async(src, dst).await {
        Ok(()) => Ok(CopyMode::Hardlinked),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                src = %src.display(),
                dst = %dst.display(),
                "hardlinks cross filesystems, falling back to a full copy"
            );
            if fs::try_exists(dst).await.unwrap_or(false) {
                fs::remove_dir_all(dst).await?;
            }
            copy_dir_contents_async(src, dst).await?;
            Ok(CopyMode::FullCopy)
        }
        Err(e) => Err(e),
    }
}

/// Recreates the directory structure of `src` under `dst`, hardlinking every file.
///
/// # Errors
///
/// Returns an error if any directory cannot be created or any file cannot be linked.
pub async fn link_tree_async(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst).await?;

    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            Box::pin(link_tree_async(&src_path, &dst_path)).await?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path).await?;
        } else {
            fs::hard_link(&src_path, &dst_path).await?;
        }
    }

    Ok(())
}

/// Recursively copies all contents from src directory to dst directory.
///
/// Creates dst if it doesn't exist. Handles both files and directories recursively.
///
/// # Example
/// ```no_run
/// use mirror_guard::utility::fs::copy::copy_dir_contents_async;
/// use std::path::Path;
///
/// # async fn example() -> std::io::Result<()> {
/// copy_dir_contents_async(Path::new("/source/dir"), Path::new("/dest/dir")).await?;
/// # Ok(())
/// # }
/// ```
/// # Errors
///
/// Returns an error if any IO operation fails (creating directory, reading, copying).
pub async fn copy_dir_contents_async(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst).await?;

    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            Box::pin(copy_dir_contents_async(&src_path, &dst_path)).await?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path).await?;
        } else {
            fs::copy(&src_path, &dst_path).await?;
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src).await?;
    debug!(link = %src.display(), target = %target.display(), "recreating symlink");
    fs::symlink(target, dst).await
}

#[cfg(not(unix))]
async fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    debug!(link = %src.display(), "copying symlink target");
    fs::copy(src, dst).await.map(|_| ())
}
