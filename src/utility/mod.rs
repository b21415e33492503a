// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Utility modules.
//!
//! ```text
//! fs
//!   walk:  parallel_walk_with_callback(), directory_size_kb(), find_files()
//!   copy:  link_or_copy_tree(), copy_dir_contents_async()
//! ```

pub mod fs;
