//! Per-repository update: fetch, rebase pull, optional submodule refresh.
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::git::{GitDriver, build_fetch_args, build_pull_args, build_submodule_args, format_git_command};

/// Options applied to one update run.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Pass `--prune` to fetch.
    pub prune: bool,
    /// Pass `--autostash` to pull.
    pub auto_stash: bool,
    /// Run `submodule update` after pulling.
    pub submodule_update: bool,
    /// Record commands without executing anything.
    pub dry_run: bool,
}

/// Outcome of one repository update.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// The repository operated on.
    pub repo_path: PathBuf,
    /// Every command that ran (or would run), in audit form.
    pub commands: Vec<String>,
    /// Reasons steps were skipped.
    pub skipped_messages: Vec<String>,
    /// Whether the upstream probe actually ran (false in dry-run).
    pub upstream_checked: bool,
    /// Probe result; `true` when unchecked.
    pub has_upstream: bool,
}

/// Run fetch + rebase-pull + optional submodule update against one repo.
///
/// In dry-run every command is recorded but nothing executes; the upstream
/// probe is skipped and the pull is recorded unconditionally.
///
/// # Errors
///
/// Returns an error when fetch, the upstream probe, pull, or the submodule
/// update fails.
pub fn update(git: &GitDriver, opts: &UpdateOptions) -> Result<UpdateReport> {
    let mut report = UpdateReport {
        repo_path: git.repo_path().to_path_buf(),
        has_upstream: true,
        ..UpdateReport::default()
    };

    let fetch_args = build_fetch_args(opts.prune);
    report
        .commands
        .push(format_git_command(git.repo_path(), &fetch_args));
    if !opts.dry_run {
        git.fetch(opts.prune).context("fetch に失敗")?;
    }

    let mut has_upstream = true;
    if !opts.dry_run {
        let (upstream, _) = git.ahead_count().context("upstream 確認に失敗")?;
        report.upstream_checked = true;
        report.has_upstream = upstream;
        has_upstream = upstream;
    }

    let pull_args = build_pull_args(opts.auto_stash);
    if opts.dry_run || has_upstream {
        report
            .commands
            .push(format_git_command(git.repo_path(), &pull_args));
        if !opts.dry_run {
            git.pull(opts.auto_stash).context("pull に失敗")?;
        }
    } else {
        report
            .skipped_messages
            .push("upstream が未設定のため pull をスキップしました".to_string());
    }

    if opts.submodule_update {
        let submodule_args = build_submodule_args();
        report
            .commands
            .push(format_git_command(git.repo_path(), &submodule_args));
        if !opts.dry_run {
            git.submodule_update().context("submodule update に失敗")?;
        }
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::Executor;
    use crate::exec::test_helpers::{MockExecutor, MockResponse};
    use std::sync::Arc;

    fn driver(mock: MockExecutor) -> (GitDriver, Arc<MockExecutor>) {
        let executor = Arc::new(mock);
        let git = GitDriver::new(Arc::clone(&executor) as Arc<dyn Executor>, "/tmp/repo");
        (git, executor)
    }

    #[test]
    fn dry_run_records_commands_without_executing() {
        let (git, mock) = driver(MockExecutor::ok(""));
        let report = update(
            &git,
            &UpdateOptions {
                prune: true,
                auto_stash: true,
                submodule_update: true,
                dry_run: true,
            },
        )
        .unwrap();

        assert_eq!(mock.call_count(), 0, "dry-run must not execute");
        assert_eq!(
            report.commands,
            vec![
                "git -C /tmp/repo fetch --all --prune",
                "git -C /tmp/repo pull --rebase --autostash",
                "git -C /tmp/repo submodule update --init --recursive --remote",
            ]
        );
        assert!(!report.upstream_checked, "probe is skipped in dry-run");
        assert!(report.has_upstream);
        assert!(report.skipped_messages.is_empty());
    }

    #[test]
    fn updates_with_upstream() {
        // fetch; upstream probe (rev-parse @{upstream} + rev-list); pull
        let (git, mock) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok(""),
            MockResponse::ok("origin/main\n"),
            MockResponse::ok("0\n"),
            MockResponse::ok(""),
        ]));

        let report = update(
            &git,
            &UpdateOptions {
                prune: false,
                auto_stash: true,
                submodule_update: false,
                dry_run: false,
            },
        )
        .unwrap();

        assert_eq!(mock.call_count(), 4);
        assert!(report.upstream_checked);
        assert!(report.has_upstream);
        assert_eq!(
            report.commands,
            vec![
                "git -C /tmp/repo fetch --all",
                "git -C /tmp/repo pull --rebase --autostash",
            ]
        );
        let calls = mock.recorded_calls();
        assert_eq!(calls[3].1[2..4], ["pull".to_string(), "--rebase".to_string()]);
    }

    #[test]
    fn skips_pull_without_upstream() {
        // fetch ok; upstream probe fails → no upstream
        let (git, mock) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok(""),
            MockResponse::fail(""),
        ]));

        let report = update(&git, &UpdateOptions::default()).unwrap();

        assert_eq!(mock.call_count(), 2, "pull must not run");
        assert!(!report.has_upstream);
        assert_eq!(
            report.skipped_messages,
            vec!["upstream が未設定のため pull をスキップしました"]
        );
        assert_eq!(report.commands, vec!["git -C /tmp/repo fetch --all"]);
    }

    #[test]
    fn fetch_failure_is_contextual() {
        let (git, _) = driver(MockExecutor::with_responses(vec![MockResponse::fail(
            "fatal: unable to access remote",
        )]));
        let err = update(&git, &UpdateOptions::default()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("fetch に失敗"));
        assert!(message.contains("unable to access remote"));
    }

    #[test]
    fn pull_failure_is_contextual() {
        let (git, _) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok(""),
            MockResponse::ok("origin/main\n"),
            MockResponse::ok("1\n"),
            MockResponse::fail("error: cannot rebase"),
        ]));
        let err = update(&git, &UpdateOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("pull に失敗"));
    }

    #[test]
    fn submodule_update_runs_when_requested() {
        let (git, mock) = driver(MockExecutor::with_responses(vec![
            MockResponse::ok(""),
            MockResponse::ok("origin/main\n"),
            MockResponse::ok("0\n"),
            MockResponse::ok(""),
            MockResponse::ok(""),
        ]));

        let report = update(
            &git,
            &UpdateOptions {
                submodule_update: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(mock.call_count(), 5);
        assert!(
            report.commands[2].contains("submodule update --init --recursive --remote"),
            "submodule command recorded: {:?}",
            report.commands
        );
    }
}
