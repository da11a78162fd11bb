//! Working-copy discovery and status scanning under the configured root.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::exec::Executor;
use crate::git::GitDriver;

/// Status of one working copy, first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    /// No upstream configured for the current branch.
    NoUpstream,
    /// Tracked or untracked changes present.
    Dirty,
    /// Ahead of upstream by at least one commit.
    Ahead,
    /// Nothing to do.
    Clean,
}

impl RepoStatus {
    /// Human-readable label used by the repo table.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NoUpstream => "追跡なし",
            Self::Dirty => "ダーティ",
            Self::Ahead => "未プッシュ",
            Self::Clean => "クリーン",
        }
    }
}

/// One discovered working copy with its computed state.
#[derive(Debug, Clone)]
pub struct Info {
    /// Root-relative display name.
    pub name: String,
    /// Absolute path of the working copy.
    pub path: PathBuf,
    /// Computed status.
    pub status: RepoStatus,
    /// Commits ahead of upstream (0 without an upstream).
    pub ahead: u32,
    /// Whether the current branch has an upstream configured.
    pub has_upstream: bool,
}

/// Root-relative display name for a repository path.
///
/// Falls back to the base name when the path is outside the root, and `.`
/// for the root itself.
#[must_use]
pub fn display_name(root: &Path, repo_path: &Path) -> String {
    if repo_path == root {
        return ".".to_string();
    }
    if let Ok(relative) = repo_path.strip_prefix(root) {
        return relative.display().to_string();
    }
    repo_path
        .file_name()
        .map_or_else(|| repo_path.display().to_string(), |name| {
            name.to_string_lossy().into_owned()
        })
}

/// Walk `root` and collect every directory containing a `.git` child
/// (directory or file, to support worktree pointers). Working copies are
/// not descended into. Results are sorted for deterministic job order.
///
/// # Errors
///
/// Returns an error when the root cannot be read.
pub fn discover_roots(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(root, &mut found)
        .with_context(|| format!("ルートディレクトリにアクセスできません: {}", root.display()))?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if dir.join(".git").exists() {
        found.push(dir.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        // Unreadable subtrees are skipped rather than failing the scan.
        if let Err(error) = walk(&path, found) {
            tracing::warn!(path = %path.display(), %error, "ディレクトリを読めないためスキップします");
        }
    }
    Ok(())
}

/// Discover working copies under `root` and compute their status in
/// parallel. Repositories whose probe fails are skipped with a warning so
/// a single broken clone does not break the listing.
///
/// # Errors
///
/// Returns an error when the root cannot be read.
pub fn scan(
    executor: &Arc<dyn Executor>,
    root: &Path,
    cancel: &CancelToken,
) -> Result<Vec<Info>> {
    let roots = discover_roots(root)?;
    let mut repos: Vec<Info> = roots
        .par_iter()
        .filter_map(|repo_path| {
            let git = GitDriver::new(Arc::clone(executor), repo_path).with_cancel(cancel);
            match probe(&git) {
                Ok((status, ahead, has_upstream)) => Some(Info {
                    name: display_name(root, repo_path),
                    path: repo_path.clone(),
                    status,
                    ahead,
                    has_upstream,
                }),
                Err(error) => {
                    tracing::warn!(
                        repo = %repo_path.display(),
                        error = %format!("{error:#}"),
                        "状態を取得できないためスキップします"
                    );
                    None
                }
            }
        })
        .collect();
    repos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(repos)
}

/// `(status, ahead, has_upstream)` per the first-match rule:
/// no-upstream, dirty, ahead, clean.
fn probe(git: &GitDriver) -> Result<(RepoStatus, u32, bool)> {
    let dirty = git.is_dirty()?;
    let (has_upstream, ahead) = git.ahead_count()?;

    let status = if !has_upstream {
        RepoStatus::NoUpstream
    } else if dirty {
        RepoStatus::Dirty
    } else if ahead > 0 {
        RepoStatus::Ahead
    } else {
        RepoStatus::Clean
    };
    Ok((status, ahead, has_upstream))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn mkdirs(root: &Path, relative: &str) {
        std::fs::create_dir_all(root.join(relative)).unwrap();
    }

    // -----------------------------------------------------------------------
    // discover_roots
    // -----------------------------------------------------------------------

    #[test]
    fn finds_repos_with_git_directory() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "repo-a/.git");
        mkdirs(tmp.path(), "team/repo-b/.git");
        mkdirs(tmp.path(), "not-a-repo");

        let found = discover_roots(tmp.path()).unwrap();
        assert_eq!(
            found,
            vec![tmp.path().join("repo-a"), tmp.path().join("team/repo-b")]
        );
    }

    #[test]
    fn git_file_marks_a_worktree_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "wt");
        std::fs::write(tmp.path().join("wt/.git"), "gitdir: /elsewhere\n").unwrap();

        let found = discover_roots(tmp.path()).unwrap();
        assert_eq!(found, vec![tmp.path().join("wt")]);
    }

    #[test]
    fn does_not_descend_into_working_copies() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "outer/.git");
        mkdirs(tmp.path(), "outer/vendor/inner/.git");

        let found = discover_roots(tmp.path()).unwrap();
        assert_eq!(found, vec![tmp.path().join("outer")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_roots(&tmp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("アクセスできません"));
    }

    #[test]
    fn root_itself_can_be_a_repo() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), ".git");
        mkdirs(tmp.path(), "child/.git");

        let found = discover_roots(tmp.path()).unwrap();
        assert_eq!(found, vec![tmp.path().to_path_buf()], "no descent past root repo");
    }

    // -----------------------------------------------------------------------
    // display_name
    // -----------------------------------------------------------------------

    #[test]
    fn display_name_direct_child() {
        assert_eq!(
            display_name(Path::new("/work/src"), Path::new("/work/src/devsync")),
            "devsync"
        );
    }

    #[test]
    fn display_name_nested() {
        assert_eq!(
            display_name(Path::new("/work/src"), Path::new("/work/src/team-a/api")),
            "team-a/api"
        );
    }

    #[test]
    fn display_name_root_itself() {
        assert_eq!(display_name(Path::new("/work/src"), Path::new("/work/src")), ".");
    }

    #[test]
    fn display_name_outside_root_uses_base_name() {
        assert_eq!(
            display_name(Path::new("/work/src"), Path::new("/opt/repos/sample")),
            "sample"
        );
    }

    // -----------------------------------------------------------------------
    // status labels
    // -----------------------------------------------------------------------

    #[test]
    fn status_labels() {
        assert_eq!(RepoStatus::Clean.label(), "クリーン");
        assert_eq!(RepoStatus::Dirty.label(), "ダーティ");
        assert_eq!(RepoStatus::Ahead.label(), "未プッシュ");
        assert_eq!(RepoStatus::NoUpstream.label(), "追跡なし");
    }
}
