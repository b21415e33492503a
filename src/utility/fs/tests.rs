// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::copy::{CopyMode, copy_dir_contents_async, link_or_copy_tree, link_tree_async};
use super::walk::{WalkOptions, directory_size_kb, find_files, parallel_walk_with_callback};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

/// A small bare-repository-like tree.
fn populate_repo(root: &Path) {
    std::fs::create_dir_all(root.join("objects/ab")).unwrap();
    std::fs::create_dir_all(root.join("refs/heads")).unwrap();
    std::fs::write(root.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    std::fs::write(root.join("objects/ab/cdef"), vec![7u8; 8192]).unwrap();
    std::fs::write(root.join("refs/heads/main"), "0123456789abcdef\n").unwrap();
}

#[test]
fn test_parallel_walk_with_callback_sees_hidden_when_asked() {
    let temp = temp_dir();
    std::fs::write(temp.path().join(".hidden"), "").unwrap();
    std::fs::write(temp.path().join("visible"), "").unwrap();

    let files = AtomicUsize::new(0);
    let count_files = |entry: &ignore::DirEntry| {
        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            files.fetch_add(1, Ordering::Relaxed);
        }
    };

    parallel_walk_with_callback(temp.path(), &WalkOptions::default(), count_files).unwrap();
    assert_eq!(files.swap(0, Ordering::Relaxed), 1);

    parallel_walk_with_callback(temp.path(), &WalkOptions::everything(), count_files).unwrap();
    assert_eq!(files.load(Ordering::Relaxed), 2);
}

#[test]
fn test_walk_missing_root_is_error() {
    let temp = temp_dir();
    let missing = temp.path().join("missing");
    assert!(parallel_walk_with_callback(&missing, &WalkOptions::default(), |_| {}).is_err());
    assert!(directory_size_kb(&missing).is_err());
}

#[test]
fn test_directory_size_counts_hardlinks_once() {
    let temp = temp_dir();
    let single = temp.path().join("single");
    let linked = temp.path().join("linked");
    let copied = temp.path().join("copied");
    for dir in [&single, &linked, &copied] {
        std::fs::create_dir(dir).unwrap();
    }

    std::fs::write(single.join("a"), vec![1u8; 16 * 1024]).unwrap();
    std::fs::write(linked.join("a"), vec![1u8; 16 * 1024]).unwrap();
    std::fs::hard_link(linked.join("a"), linked.join("b")).unwrap();
    std::fs::write(copied.join("a"), vec![1u8; 16 * 1024]).unwrap();
    std::fs::write(copied.join("b"), vec![1u8; 16 * 1024]).unwrap();

    let single_kb = directory_size_kb(&single).unwrap();
    let linked_kb = directory_size_kb(&linked).unwrap();
    let copied_kb = directory_size_kb(&copied).unwrap();

    assert!(single_kb >= 16, "16 KiB of data, got {single_kb}");
    assert_eq!(single_kb, linked_kb);
    assert!(copied_kb > linked_kb);
}

#[test]
fn test_find_files_matches_relative_glob() {
    let temp = temp_dir();
    std::fs::write(temp.path().join("archive-202601.bundle"), "").unwrap();
    std::fs::write(temp.path().join("archive-202602.bundle"), "").unwrap();
    std::fs::write(temp.path().join("notes.txt"), "").unwrap();
    std::fs::write(temp.path().join(".archive-x.partial"), "").unwrap();

    let names: Vec<String> = find_files(temp.path(), "archive-*.bundle")
        .unwrap()
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(String::from))
        .collect();

    insta::assert_debug_snapshot!(names, @r#"
    [
        "archive-202601.bundle",
        "archive-202602.bundle",
    ]
    "#);
}

#[test]
fn test_find_files_invalid_glob() {
    let temp = temp_dir();
    assert!(find_files(temp.path(), "[").is_err());
}

#[tokio::test]
async fn test_link_tree_shares_inodes() {
    let temp = temp_dir();
    let src = temp.path().join("repo.git");
    let dst = temp.path().join("snapshot");
    populate_repo(&src);

    link_tree_async(&src, &dst).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dst.join("HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let src_meta = std::fs::metadata(src.join("objects/ab/cdef")).unwrap();
        let dst_meta = std::fs::metadata(dst.join("objects/ab/cdef")).unwrap();
        assert_eq!(src_meta.ino(), dst_meta.ino());
        assert!(dst_meta.nlink() >= 2);
    }
}

#[tokio::test]
async fn test_link_or_copy_tree_same_device_links() {
    let temp = temp_dir();
    let src = temp.path().join("repo.git");
    let dst = temp.path().join("snapshot");
    populate_repo(&src);

    let mode = link_or_copy_tree(&src, &dst).await.unwrap();
    assert_eq!(mode, CopyMode::Hardlinked);
    assert!(dst.join("refs/heads/main").is_file());
}

#[tokio::test]
async fn test_copy_dir_contents_is_independent() {
    let temp = temp_dir();
    let src = temp.path().join("repo.git");
    let dst = temp.path().join("copy");
    populate_repo(&src);

    copy_dir_contents_async(&src, &dst).await.unwrap();
    std::fs::write(src.join("HEAD"), "changed").unwrap();

    assert_eq!(
        std::fs::read_to_string(dst.join("HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    assert_eq!(
        std::fs::read(dst.join("objects/ab/cdef")).unwrap().len(),
        8192
    );
}

#[tokio::test]
async fn test_link_tree_missing_source_fails() {
    let temp = temp_dir();
    let err = link_or_copy_tree(&temp.path().join("absent"), &temp.path().join("dst"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}
