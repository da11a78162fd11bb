//! Thin typed operations over the external `git` binary.
//!
//! Every operation pins the working copy with `-C <path>` so jobs never
//! depend on the process working directory, and the exact argument vectors
//! are exposed through builders so dry-run output can show the real
//! commands.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use crate::cancel::CancelToken;
use crate::error::ExecError;
use crate::exec::{ExecRequest, ExecResult, Executor};

/// Arguments for the refresh fetch.
#[must_use]
pub fn build_fetch_args(prune: bool) -> Vec<String> {
    let mut args = vec!["fetch".to_string(), "--all".to_string()];
    if prune {
        args.push("--prune".to_string());
    }
    args
}

/// Arguments for the rebase pull.
#[must_use]
pub fn build_pull_args(auto_stash: bool) -> Vec<String> {
    let mut args = vec!["pull".to_string(), "--rebase".to_string()];
    if auto_stash {
        args.push("--autostash".to_string());
    }
    args
}

/// Arguments for the submodule refresh.
#[must_use]
pub fn build_submodule_args() -> Vec<String> {
    ["submodule", "update", "--init", "--recursive", "--remote"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Render the audit/dry-run form of a git invocation:
/// `git -C <path> <args…>` space-joined.
#[must_use]
pub fn format_git_command(repo_path: &Path, args: &[String]) -> String {
    let mut parts = vec![
        "git".to_string(),
        "-C".to_string(),
        repo_path.display().to_string(),
    ];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

/// Typed git operations against one working copy.
#[derive(Debug, Clone)]
pub struct GitDriver {
    executor: Arc<dyn Executor>,
    repo_path: PathBuf,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl GitDriver {
    /// Create a driver for the working copy at `repo_path`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            repo_path: repo_path.into(),
            timeout: None,
            cancel: None,
        }
    }

    /// Apply an operation timeout to every git call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kill in-flight git calls when `token` cancels.
    #[must_use]
    pub fn with_cancel(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// The working copy this driver operates on.
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn request(&self, args: &[String]) -> ExecRequest {
        let mut request = ExecRequest::new("git")
            .args(["-C".to_string(), self.repo_path.display().to_string()])
            .args(args.iter().cloned());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        if let Some(token) = &self.cancel {
            request = request.cancel(token);
        }
        request
    }

    /// Run a git command, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Propagates [`ExecError`] from the process runner.
    pub fn run(&self, args: &[String]) -> Result<()> {
        self.executor.run(&self.request(args))?;
        Ok(())
    }

    /// Run a git command and return trimmed stdout.
    ///
    /// # Errors
    ///
    /// Propagates [`ExecError`] from the process runner.
    pub fn output(&self, args: &[String]) -> Result<String> {
        let result = self.executor.run(&self.request(args))?;
        Ok(result.stdout.trim().to_string())
    }

    fn output_unchecked(&self, args: &[String]) -> Result<ExecResult> {
        self.executor.run_unchecked(&self.request(args))
    }

    /// `git fetch --all [--prune]`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn fetch(&self, prune: bool) -> Result<()> {
        self.run(&build_fetch_args(prune))
    }

    /// `git pull --rebase [--autostash]`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn pull(&self, auto_stash: bool) -> Result<()> {
        self.run(&build_pull_args(auto_stash))
    }

    /// `git submodule update --init --recursive --remote`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn submodule_update(&self) -> Result<()> {
        self.run(&build_submodule_args())
    }

    /// Configured remotes, sorted.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn list_remotes(&self) -> Result<Vec<String>> {
        let output = self.output(&["remote".to_string()])?;
        let mut remotes: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();
        remotes.sort();
        Ok(remotes)
    }

    /// The upstream tracking ref of the current branch (`origin/main`), or
    /// `None` when no upstream is configured.
    ///
    /// # Errors
    ///
    /// Returns an error only when git itself could not be executed.
    pub fn upstream_ref(&self) -> Result<Option<String>> {
        let result = self.output_unchecked(&[
            "rev-parse".to_string(),
            "--abbrev-ref".to_string(),
            "--symbolic-full-name".to_string(),
            "@{upstream}".to_string(),
        ])?;
        if !result.success {
            return Ok(None);
        }
        let upstream = result.stdout.trim().to_string();
        Ok((!upstream.is_empty()).then_some(upstream))
    }

    /// `(has_upstream, commits ahead of upstream)`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn ahead_count(&self) -> Result<(bool, u32)> {
        if self.upstream_ref()?.is_none() {
            return Ok((false, 0));
        }
        let output = self.output(&[
            "rev-list".to_string(),
            "--count".to_string(),
            "@{u}..HEAD".to_string(),
        ])?;
        let ahead = output
            .parse::<u32>()
            .with_context(|| format!("ahead 数を解釈できません: {output:?}"))?;
        Ok((true, ahead))
    }

    /// Short name of the current branch (the literal `HEAD` when detached).
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn current_branch(&self) -> Result<String> {
        self.output(&[
            "rev-parse".to_string(),
            "--abbrev-ref".to_string(),
            "HEAD".to_string(),
        ])
    }

    /// The remote's default branch ref in `<remote>/<branch>` short form,
    /// read from `refs/remotes/<remote>/HEAD`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn default_ref_of(&self, remote: &str) -> Result<String> {
        let output = self.output(&[
            "symbolic-ref".to_string(),
            format!("refs/remotes/{remote}/HEAD"),
        ])?;
        Ok(output
            .strip_prefix("refs/remotes/")
            .unwrap_or(&output)
            .to_string())
    }

    /// Local branches fully merged into `base`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure, or rejects a blank base.
    pub fn merged_branches(&self, base: &str) -> Result<Vec<String>> {
        if base.trim().is_empty() {
            anyhow::bail!("baseRef が空です");
        }
        let output = self.output(&[
            "for-each-ref".to_string(),
            "--format=%(refname:short)".to_string(),
            format!("--merged={base}"),
            "refs/heads".to_string(),
        ])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Whether `refs/heads/<branch>` exists.
    ///
    /// # Errors
    ///
    /// Returns an error when git fails for a reason other than "ref absent"
    /// (exit code 1).
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let result = self.output_unchecked(&[
            "show-ref".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
            format!("refs/heads/{branch}"),
        ])?;
        if result.success {
            return Ok(true);
        }
        if result.code == Some(1) {
            return Ok(false);
        }
        Err(ExecError::Failed {
            program: "git".to_string(),
            code: result.code.unwrap_or(-1),
            stderr: result.stderr.trim().to_string(),
        }
        .into())
    }

    /// The commit id a branch points at.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn branch_tip(&self, branch: &str) -> Result<String> {
        self.output(&["rev-parse".to_string(), branch.to_string()])
    }

    /// Whether the working tree has tracked or untracked changes.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn is_dirty(&self) -> Result<bool> {
        let output = self.output(&["status".to_string(), "--porcelain".to_string()])?;
        Ok(!output.is_empty())
    }

    /// Whether the stash is non-empty.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn has_stash(&self) -> Result<bool> {
        let output = self.output(&["stash".to_string(), "list".to_string()])?;
        Ok(!output.is_empty())
    }

    /// Whether HEAD is detached.
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn is_detached_head(&self) -> Result<bool> {
        Ok(self.current_branch()? == "HEAD")
    }

    /// Delete a local branch (`-d`, or `-D` when `force`).
    ///
    /// # Errors
    ///
    /// Propagates the underlying git failure.
    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<()> {
        self.run(&delete_branch_args(branch, force))
    }
}

/// Arguments for a branch deletion, shared with dry-run rendering.
#[must_use]
pub fn delete_branch_args(branch: &str, force: bool) -> Vec<String> {
    let flag = if force { "-D" } else { "-d" };
    vec!["branch".to_string(), flag.to_string(), branch.to_string()]
}

/// Clone `url` into `target` (runs outside any working copy).
///
/// # Errors
///
/// Propagates the underlying git failure.
pub fn clone_repo(
    executor: &dyn Executor,
    url: &str,
    target: &Path,
    cancel: &CancelToken,
) -> Result<()> {
    let request = ExecRequest::new("git")
        .args([
            "clone".to_string(),
            url.to_string(),
            target.display().to_string(),
        ])
        .cancel(cancel);
    executor.run(&request)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::{MockExecutor, MockResponse};

    fn driver(mock: MockExecutor) -> (GitDriver, Arc<MockExecutor>) {
        let executor = Arc::new(mock);
        let driver = GitDriver::new(
            Arc::clone(&executor) as Arc<dyn Executor>,
            PathBuf::from("/tmp/repo"),
        );
        (driver, executor)
    }

    // -----------------------------------------------------------------------
    // Argument builders
    // -----------------------------------------------------------------------

    #[test]
    fn fetch_args_with_prune() {
        assert_eq!(build_fetch_args(true), vec!["fetch", "--all", "--prune"]);
    }

    #[test]
    fn fetch_args_without_prune() {
        assert_eq!(build_fetch_args(false), vec!["fetch", "--all"]);
    }

    #[test]
    fn pull_args_with_autostash() {
        assert_eq!(build_pull_args(true), vec!["pull", "--rebase", "--autostash"]);
    }

    #[test]
    fn pull_args_without_autostash() {
        assert_eq!(build_pull_args(false), vec!["pull", "--rebase"]);
    }

    #[test]
    fn submodule_args() {
        assert_eq!(
            build_submodule_args(),
            vec!["submodule", "update", "--init", "--recursive", "--remote"]
        );
    }

    #[test]
    fn delete_args_respect_force() {
        assert_eq!(delete_branch_args("f", false), vec!["branch", "-d", "f"]);
        assert_eq!(delete_branch_args("f", true), vec!["branch", "-D", "f"]);
    }

    #[test]
    fn format_command_is_space_joined() {
        let got = format_git_command(Path::new("/tmp/repo"), &build_fetch_args(true));
        assert_eq!(got, "git -C /tmp/repo fetch --all --prune");
    }

    // -----------------------------------------------------------------------
    // Driver operations — exact command lines via the mock
    // -----------------------------------------------------------------------

    #[test]
    fn every_call_pins_the_repo_path() {
        let (git, mock) = driver(MockExecutor::ok(""));
        git.fetch(false).unwrap();
        let (program, args) = &mock.recorded_calls()[0];
        assert_eq!(program, "git");
        assert_eq!(args[..2], ["-C".to_string(), "/tmp/repo".to_string()]);
        assert_eq!(args[2..], ["fetch".to_string(), "--all".to_string()]);
    }

    #[test]
    fn list_remotes_sorts_and_drops_blanks() {
        let (git, _) = driver(MockExecutor::ok("upstream\n\norigin\n"));
        assert_eq!(git.list_remotes().unwrap(), vec!["origin", "upstream"]);
    }

    #[test]
    fn upstream_ref_none_on_failure() {
        let (git, _) = driver(MockExecutor::fail());
        assert_eq!(git.upstream_ref().unwrap(), None);
    }

    #[test]
    fn upstream_ref_trims_output() {
        let (git, _) = driver(MockExecutor::ok("origin/main\n"));
        assert_eq!(git.upstream_ref().unwrap(), Some("origin/main".to_string()));
    }

    #[test]
    fn ahead_count_without_upstream() {
        let (git, mock) = driver(MockExecutor::fail());
        assert_eq!(git.ahead_count().unwrap(), (false, 0));
        assert_eq!(mock.call_count(), 1, "rev-list must not run without upstream");
    }

    #[test]
    fn ahead_count_parses_rev_list() {
        let (git, _) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok("origin/main\n"),
            MockResponse::ok("3\n"),
        ]));
        assert_eq!(git.ahead_count().unwrap(), (true, 3));
    }

    #[test]
    fn default_ref_of_strips_refs_remotes_prefix() {
        let (git, mock) = driver(MockExecutor::ok("refs/remotes/origin/main\n"));
        assert_eq!(git.default_ref_of("origin").unwrap(), "origin/main");
        let (_, args) = &mock.recorded_calls()[0];
        assert_eq!(args[2..], [
            "symbolic-ref".to_string(),
            "refs/remotes/origin/HEAD".to_string()
        ]);
    }

    #[test]
    fn merged_branches_requires_base() {
        let (git, _) = driver(MockExecutor::ok(""));
        assert!(git.merged_branches("  ").is_err());
    }

    #[test]
    fn merged_branches_splits_lines() {
        let (git, mock) = driver(MockExecutor::ok("feature/a\nfeature/b\n\n"));
        assert_eq!(
            git.merged_branches("origin/main").unwrap(),
            vec!["feature/a", "feature/b"]
        );
        let (_, args) = &mock.recorded_calls()[0];
        assert!(args.contains(&"--merged=origin/main".to_string()));
        assert!(args.contains(&"refs/heads".to_string()));
    }

    #[test]
    fn branch_exists_true_on_success() {
        let (git, _) = driver(MockExecutor::ok(""));
        assert!(git.branch_exists("feature/a").unwrap());
    }

    #[test]
    fn branch_exists_false_on_exit_one() {
        let (git, _) = driver(MockExecutor::fail());
        assert!(!git.branch_exists("feature/a").unwrap());
    }

    #[test]
    fn branch_exists_propagates_other_errors() {
        let (git, _) = driver(MockExecutor::with_responses(vec![MockResponse {
            success: false,
            stdout: String::new(),
            stderr: "fatal: bad repo".to_string(),
            code: 128,
        }]));
        assert!(git.branch_exists("feature/a").is_err());
    }

    #[test]
    fn is_dirty_on_porcelain_output() {
        let (git, _) = driver(MockExecutor::ok(" M src/main.rs\n"));
        assert!(git.is_dirty().unwrap());
        let (clean, _) = driver(MockExecutor::ok("\n"));
        assert!(!clean.is_dirty().unwrap());
    }

    #[test]
    fn is_detached_head_matches_literal_head() {
        let (git, _) = driver(MockExecutor::ok("HEAD\n"));
        assert!(git.is_detached_head().unwrap());
        let (on_branch, _) = driver(MockExecutor::ok("main\n"));
        assert!(!on_branch.is_detached_head().unwrap());
    }

    #[test]
    fn delete_branch_uses_force_flag() {
        let (git, mock) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok(""),
            MockResponse::ok(""),
        ]));
        git.delete_branch("feature/a", false).unwrap();
        git.delete_branch("feature/b", true).unwrap();
        let calls = mock.recorded_calls();
        assert_eq!(calls[0].1[2..], ["branch".to_string(), "-d".to_string(), "feature/a".to_string()]);
        assert_eq!(calls[1].1[2..], ["branch".to_string(), "-D".to_string(), "feature/b".to_string()]);
    }
}
