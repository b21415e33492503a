// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Filesystem utilities with parallel traversal and async tree copy.
//!
//! ```text
//! walk:  parallel_walk_with_callback()  ignore::WalkParallel (multi-core)
//!        directory_size_kb()            du -sk, each inode once
//!        find_files()                   glob pattern matching
//! copy:  link_or_copy_tree()            hardlinks, copy on EXDEV
//!        copy_dir_contents_async()      recursive byte copy
//! ```

pub mod copy;
pub mod walk;

#[cfg(test)]
mod tests;
