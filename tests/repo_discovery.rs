//! Filesystem-level discovery behaviour through the public API.
#![allow(clippy::expect_used)]

use devsync_cli::repo::{discover_roots, display_name};

fn mkdirs(root: &std::path::Path, relative: &str) {
    std::fs::create_dir_all(root.join(relative)).expect("create test dirs");
}

#[test]
fn nested_tree_with_mixed_markers() {
    let tmp = tempfile::tempdir().expect("tempdir");

    // Plain repos, a worktree pointer file, and decoys.
    mkdirs(tmp.path(), "alpha/.git");
    mkdirs(tmp.path(), "team/beta/.git");
    mkdirs(tmp.path(), "team/deep/nested/gamma/.git");
    mkdirs(tmp.path(), "worktrees/delta");
    std::fs::write(
        tmp.path().join("worktrees/delta/.git"),
        "gitdir: ../../alpha/.git/worktrees/delta\n",
    )
    .expect("write .git file");
    mkdirs(tmp.path(), "notes/no-repo-here");

    let found = discover_roots(tmp.path()).expect("discovery");
    let names: Vec<String> = found
        .iter()
        .map(|path| display_name(tmp.path(), path))
        .collect();

    assert_eq!(
        names,
        vec![
            "alpha",
            "team/beta",
            "team/deep/nested/gamma",
            "worktrees/delta"
        ]
    );
}

#[test]
fn working_copies_are_not_descended_into() {
    let tmp = tempfile::tempdir().expect("tempdir");
    mkdirs(tmp.path(), "outer/.git");
    mkdirs(tmp.path(), "outer/vendor/inner/.git");
    mkdirs(tmp.path(), "outer/submodules/third/.git");

    let found = discover_roots(tmp.path()).expect("discovery");
    assert_eq!(found, vec![tmp.path().join("outer")]);
}

#[test]
fn empty_root_finds_nothing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    assert!(discover_roots(tmp.path()).expect("discovery").is_empty());
}
