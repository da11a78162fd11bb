//! Safe deletion of local branches that are merged or squash-merged
//! upstream.
//!
//! `merged` targets are branches git itself reports as merged into the
//! remote default branch (`branch -d`). `squashed` targets are branches
//! whose tip matches a merged PR's head commit even though the commit graph
//! does not show ancestry (`branch -D`).
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};

use crate::git::{GitDriver, build_fetch_args, delete_branch_args, format_git_command};

const TARGET_MERGED: &str = "merged";
const TARGET_SQUASHED: &str = "squashed";

/// Why a branch is planned for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTarget {
    /// Merged in the commit graph; safe delete (`-d`).
    Merged,
    /// Squash-merged per the host; force delete (`-D`).
    Squashed,
}

impl CleanupTarget {
    /// The configuration keyword for this target.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merged => TARGET_MERGED,
            Self::Squashed => TARGET_SQUASHED,
        }
    }

    /// Whether deletion must be forced. Squash-merged branches are never
    /// graph-merged, so `-d` would refuse them.
    #[must_use]
    pub fn force(self) -> bool {
        matches!(self, Self::Squashed)
    }
}

/// The remote's default branch, resolved from `refs/remotes/<remote>/HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBranchInfo {
    /// Remote name (e.g. `origin`).
    pub remote: String,
    /// Fully qualified short ref, always `<remote>/<branch>`.
    pub ref_name: String,
    /// Short branch name, never empty.
    pub branch: String,
}

/// A deferred decision to delete one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    /// Local branch name.
    pub branch: String,
    /// Reason for the deletion.
    pub target: CleanupTarget,
    /// True iff `target` is squashed.
    pub force: bool,
}

/// Options for one cleanup run.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Pass `--prune` to the refresh fetch (forced off in dry-run).
    pub prune: bool,
    /// Record delete commands without executing them.
    pub dry_run: bool,
    /// Requested targets; unknown strings are dropped.
    pub targets: Vec<String>,
    /// User-protected branches, in addition to the default and current one.
    pub exclude_branches: Vec<String>,
    /// Merged-PR head commit per branch, for the squashed target.
    pub squashed_pr_heads: BTreeMap<String, String>,
}

/// Result of one cleanup run. Per-branch failures are recorded here and
/// surfaced as an aggregate via [`CleanupReport::delete_error`].
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Repository operated on.
    pub repo_path: PathBuf,
    /// Resolved remote name.
    pub remote: String,
    /// Resolved `<remote>/<branch>` ref.
    pub default_ref: String,
    /// Resolved default branch name.
    pub default_branch: String,
    /// Every command that ran (or would run), in audit form.
    pub commands: Vec<String>,
    /// Deletes recorded in dry-run.
    pub planned_deletes: Vec<CleanupPlan>,
    /// Deletes that actually succeeded.
    pub deleted_branches: Vec<CleanupPlan>,
    /// Reasons the run (or parts of it) was skipped.
    pub skipped_messages: Vec<String>,
    /// Per-branch delete failures.
    pub errors: Vec<String>,
}

impl CleanupReport {
    /// The aggregate error when any per-branch delete failed.
    #[must_use]
    pub fn delete_error(&self) -> Option<anyhow::Error> {
        if self.errors.is_empty() {
            return None;
        }
        Some(anyhow!("{} 件のブランチ削除に失敗しました", self.errors.len()))
    }
}

/// Resolve the remote default branch for a repository.
///
/// The upstream's remote wins when set; otherwise `origin` when present;
/// otherwise the sole remote.
///
/// # Errors
///
/// Fails when no remote can be determined or the HEAD ref is malformed.
pub fn detect_default_branch(git: &GitDriver) -> Result<DefaultBranchInfo> {
    let remote = detect_cleanup_remote(git)?;
    let ref_name = git.default_ref_of(&remote)?;

    let Some((_, branch)) = ref_name.split_once('/') else {
        anyhow::bail!(
            "リモートのデフォルトブランチ参照 {ref_name:?} が `<remote>/<branch>` 形式ではありません"
        );
    };
    if branch.trim().is_empty() {
        anyhow::bail!(
            "リモートのデフォルトブランチ参照 {ref_name:?} が `<remote>/<branch>` 形式ではありません"
        );
    }

    Ok(DefaultBranchInfo {
        remote,
        branch: branch.to_string(),
        ref_name,
    })
}

fn detect_cleanup_remote(git: &GitDriver) -> Result<String> {
    let remotes = git.list_remotes()?;

    if let Some(upstream) = git.upstream_ref()?
        && let Some((remote, _)) = upstream.split_once('/')
        && !remote.trim().is_empty()
    {
        return Ok(remote.to_string());
    }

    if remotes.iter().any(|remote| remote.as_str() == "origin") {
        return Ok("origin".to_string());
    }

    match remotes.len() {
        1 => Ok(remotes.into_iter().next().unwrap_or_default()),
        0 => Err(anyhow!("リモートが設定されていません")),
        _ => Err(anyhow!("リモートが複数あるため特定できません: {remotes:?}")),
    }
}

/// Which of the two targets the (case- and whitespace-insensitive) list
/// requests. Unknown strings are dropped.
#[must_use]
pub fn resolve_targets(targets: &[String]) -> (bool, bool) {
    let mut merged = false;
    let mut squashed = false;
    for target in targets {
        match target.trim().to_lowercase().as_str() {
            TARGET_MERGED => merged = true,
            TARGET_SQUASHED => squashed = true,
            _ => {}
        }
    }
    (merged, squashed)
}

/// Whether the target list requests `want` (used by the orchestrator to
/// decide whether PR heads must be fetched at all).
#[must_use]
pub fn wants_target(targets: &[String], want: &str) -> bool {
    targets
        .iter()
        .any(|target| target.trim().to_lowercase() == want)
}

/// Delete merged / squash-merged local branches of one repository.
///
/// Recoverable conditions (unsafe tree, unresolvable default branch, empty
/// or invalid targets, nothing to delete) are recorded as skip messages in
/// the report with an `Ok` return. Per-branch delete failures accumulate in
/// `errors`; check [`CleanupReport::delete_error`].
///
/// # Errors
///
/// Fails on infrastructure errors: fetch failure, a status probe failure
/// outside dry-run, or a failing plan-construction git call.
pub fn cleanup(git: &GitDriver, opts: &CleanupOptions) -> Result<CleanupReport> {
    let mut report = CleanupReport {
        repo_path: git.repo_path().to_path_buf(),
        ..CleanupReport::default()
    };

    // The fetch always runs so refs are fresh, but dry-run must not prune
    // remote refs.
    let prune = opts.prune && !opts.dry_run;
    report
        .commands
        .push(format_git_command(git.repo_path(), &build_fetch_args(prune)));
    git.fetch(prune).context("fetch に失敗")?;

    match detect_unsafe_state(git) {
        Ok(messages) if messages.is_empty() => {}
        Ok(messages) => {
            report.skipped_messages.extend(messages);
            return Ok(report);
        }
        Err(error) if opts.dry_run => {
            report.skipped_messages.push(format!(
                "リポジトリ状態の判定に失敗したため cleanup をスキップしました: {error:#}"
            ));
            return Ok(report);
        }
        Err(error) => return Err(error.context("リポジトリ状態の判定に失敗")),
    }

    let default_info = match detect_default_branch(git) {
        Ok(info) => info,
        Err(error) => {
            report.skipped_messages.push(format!(
                "デフォルトブランチの判定に失敗したため cleanup をスキップしました: {error:#}"
            ));
            return Ok(report);
        }
    };
    report.remote = default_info.remote.clone();
    report.default_ref = default_info.ref_name.clone();
    report.default_branch = default_info.branch.clone();

    if opts.targets.is_empty() {
        report
            .skipped_messages
            .push("repo.cleanup.target が空のため cleanup をスキップしました".to_string());
        return Ok(report);
    }
    let (do_merged, do_squashed) = resolve_targets(&opts.targets);
    if !do_merged && !do_squashed {
        report.skipped_messages.push(format!(
            "repo.cleanup.target が不正なため cleanup をスキップしました: {:?}",
            opts.targets
        ));
        return Ok(report);
    }

    let current_branch = git.current_branch().context("現在のブランチ取得に失敗")?;
    let excluded = build_excluded_set(&current_branch, &default_info.branch, &opts.exclude_branches);

    let plans = build_plans(
        git,
        &default_info.ref_name,
        &excluded,
        do_merged,
        do_squashed,
        &opts.squashed_pr_heads,
    )?;
    if plans.is_empty() {
        report
            .skipped_messages
            .push("削除対象のブランチがありません".to_string());
        return Ok(report);
    }

    for plan in plans {
        let args = delete_branch_args(&plan.branch, plan.force);
        report
            .commands
            .push(format_git_command(git.repo_path(), &args));

        if opts.dry_run {
            report.planned_deletes.push(plan);
            continue;
        }

        match git.run(&args) {
            Ok(()) => report.deleted_branches.push(plan),
            Err(error) => report
                .errors
                .push(format!("{} の削除に失敗: {error:#}", plan.branch)),
        }
    }

    Ok(report)
}

fn detect_unsafe_state(git: &GitDriver) -> Result<Vec<String>> {
    let mut messages = Vec::with_capacity(3);

    if git.is_dirty()? {
        messages.push(
            "未コミットの変更があるため cleanup をスキップしました（tracked/untracked を含む）"
                .to_string(),
        );
    }

    if git.has_stash()? {
        messages.push(
            "stash が残っているため cleanup をスキップしました（git stash list で確認してください）"
                .to_string(),
        );
    }

    if git.is_detached_head()? {
        messages.push(
            "detached HEAD のため cleanup をスキップしました（ブランチをチェックアウトしてください）"
                .to_string(),
        );
    }

    Ok(messages)
}

fn build_excluded_set(
    current_branch: &str,
    default_branch: &str,
    exclude_branches: &[String],
) -> BTreeSet<String> {
    let mut set = BTreeSet::new();

    if !default_branch.trim().is_empty() {
        set.insert(default_branch.to_string());
    }

    if !current_branch.trim().is_empty() && current_branch != "HEAD" {
        set.insert(current_branch.to_string());
    }

    for branch in exclude_branches {
        let branch = branch.trim();
        if branch.is_empty() {
            continue;
        }
        set.insert(branch.to_string());
    }

    set
}

/// Build the sorted deletion plan. The `BTreeMap` keyed by branch gives the
/// deterministic ordering and the "merged plan wins over squashed" rule in
/// one structure.
fn build_plans(
    git: &GitDriver,
    default_ref: &str,
    excluded: &BTreeSet<String>,
    do_merged: bool,
    do_squashed: bool,
    squashed_heads: &BTreeMap<String, String>,
) -> Result<Vec<CleanupPlan>> {
    let mut planned: BTreeMap<String, CleanupPlan> = BTreeMap::new();

    if do_merged {
        let merged = git
            .merged_branches(default_ref)
            .context("マージ済みブランチ一覧の取得に失敗")?;
        for branch in merged {
            if excluded.contains(&branch) {
                continue;
            }
            planned.insert(
                branch.clone(),
                CleanupPlan {
                    branch,
                    target: CleanupTarget::Merged,
                    force: false,
                },
            );
        }
    }

    if do_squashed && !squashed_heads.is_empty() {
        for (branch, head) in squashed_heads {
            let branch = branch.trim();
            let head = head.trim();
            if branch.is_empty() || head.is_empty() {
                continue;
            }
            if excluded.contains(branch) || planned.contains_key(branch) {
                continue;
            }

            let exists = git
                .branch_exists(branch)
                .context("ローカルブランチ存在確認に失敗")?;
            if !exists {
                continue;
            }

            let tip = git
                .branch_tip(branch)
                .with_context(|| format!("{branch} の先頭コミット取得に失敗"))?;
            if tip != head {
                continue;
            }

            planned.insert(
                branch.to_string(),
                CleanupPlan {
                    branch: branch.to_string(),
                    target: CleanupTarget::Squashed,
                    force: true,
                },
            );
        }
    }

    Ok(planned.into_values().collect())
}
