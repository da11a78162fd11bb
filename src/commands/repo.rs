//! Repository sub-commands: list, update (with GitHub bootstrap), cleanup.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use super::{CommandContext, run_with_progress};
use crate::cli::RepoUpdateOpts;
use crate::config::{Config, resolve_submodule_update};
use crate::git::{GitDriver, clone_repo};
use crate::github::{GhClient, GithubRepo, TokenSleeper};
use crate::repo::cleanup::wants_target;
use crate::repo::{
    CleanupOptions, Info, UpdateOptions, discover_roots, display_name, scan,
};
use crate::runner::Job;

/// `devsync repo list`: discovery plus a status table.
///
/// # Errors
///
/// Fails when the root is not configured or unreadable.
#[allow(clippy::print_stdout)]
pub fn list(ctx: &CommandContext) -> Result<()> {
    let root = ctx.config.repo_root()?;
    let repos = scan(&ctx.executor, &root, &ctx.cancel)?;

    if repos.is_empty() {
        println!("リポジトリが見つかりませんでした: {}", root.display());
        return Ok(());
    }

    println!("管理下リポジトリ一覧 ({} 件)\n", repos.len());
    print!("{}", render_repo_table(&repos));
    Ok(())
}

/// Render the aligned name/status/ahead/path table.
#[must_use]
pub fn render_repo_table(repos: &[Info]) -> String {
    let mut rows: Vec<[String; 4]> = vec![
        [
            "名前".to_string(),
            "状態".to_string(),
            "Ahead".to_string(),
            "パス".to_string(),
        ],
        [
            "----".to_string(),
            "----".to_string(),
            "-----".to_string(),
            "----".to_string(),
        ],
    ];
    for repo in repos {
        let ahead = if repo.has_upstream {
            repo.ahead.to_string()
        } else {
            "-".to_string()
        };
        rows.push([
            repo.name.clone(),
            repo.status.label().to_string(),
            ahead,
            repo.path.display().to_string(),
        ]);
    }

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &rows {
        let mut line = String::new();
        for (index, (cell, width)) in row.iter().zip(&widths).enumerate() {
            line.push_str(cell);
            if index + 1 < row.len() {
                let padding = width - cell.chars().count() + 2;
                line.push_str(&" ".repeat(padding));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// `devsync repo update`: optional GitHub bootstrap, then the update phase
/// and — strictly afterwards — the cleanup phase when targets are
/// configured.
///
/// # Errors
///
/// Fails when any repository job failed, with an aggregate count.
#[allow(clippy::print_stdout)]
pub fn update(ctx: &CommandContext, opts: &RepoUpdateOpts) -> Result<()> {
    let root = ctx.config.repo_root()?;
    let submodule_update = resolve_submodule_update(
        ctx.config.repo.update.submodule_update,
        opts.enable_submodule_update,
        opts.disable_submodule_update,
    )?;

    if !opts.no_bootstrap && !ctx.config.repo.github.owner.is_empty() {
        let client = gh_client(ctx);
        let owner = ctx.config.repo.github.owner.clone();
        let bootstrap = bootstrap_repos(
            &root,
            &ctx.config,
            ctx.dry_run,
            || client.list_repos(&owner),
            |url, target| clone_repo(ctx.executor.as_ref(), url, target, &ctx.cancel),
        );
        match bootstrap {
            Ok(result) => {
                if result.planned_only > 0 {
                    tracing::info!(planned = result.planned_only, "clone は dry-run のため計画のみです");
                }
            }
            Err(error) => {
                tracing::warn!(
                    error = %format!("{error:#}"),
                    "GitHub からのリポジトリ取得に失敗しました（既存リポジトリのみ更新します）"
                );
            }
        }
    }

    let repos = discover_roots(&root)?;
    if repos.is_empty() {
        println!("リポジトリが見つかりませんでした: {}", root.display());
        return Ok(());
    }

    let update_options = UpdateOptions {
        prune: ctx.config.repo.update.prune,
        auto_stash: ctx.config.repo.update.auto_stash,
        submodule_update,
        dry_run: ctx.dry_run,
    };

    let jobs: Vec<Job<'_>> = repos
        .iter()
        .map(|repo_path| {
            let name = display_name(&root, repo_path);
            let path = repo_path.clone();
            Job::new(name, move || update_repo(ctx, &path, &update_options))
        })
        .collect();
    let summary = run_with_progress("repo update", jobs, ctx.jobs, &ctx.cancel);

    // Cleanup runs as a second phase so no repository ever sees update and
    // cleanup concurrently, at any pool size.
    let mut cleanup_failed = 0;
    if !ctx.config.repo.cleanup.targets.is_empty() {
        let cleanup_summary = run_cleanup_phase(ctx, &root, &repos);
        cleanup_failed = cleanup_summary.failed;
    }

    let failed = summary.failed + cleanup_failed;
    if failed > 0 {
        anyhow::bail!("{failed} 件のリポジトリ操作に失敗しました");
    }
    Ok(())
}

/// `devsync repo cleanup`: the cleanup phase alone.
///
/// # Errors
///
/// Fails when any repository's cleanup job failed.
#[allow(clippy::print_stdout)]
pub fn cleanup(ctx: &CommandContext) -> Result<()> {
    let root = ctx.config.repo_root()?;
    let repos = discover_roots(&root)?;
    if repos.is_empty() {
        println!("リポジトリが見つかりませんでした: {}", root.display());
        return Ok(());
    }

    let summary = run_cleanup_phase(ctx, &root, &repos);
    if summary.failed > 0 {
        anyhow::bail!("{} 件のリポジトリ cleanup に失敗しました", summary.failed);
    }
    Ok(())
}

fn run_cleanup_phase(
    ctx: &CommandContext,
    root: &Path,
    repos: &[PathBuf],
) -> crate::runner::RunSummary {
    let jobs: Vec<Job<'_>> = repos
        .iter()
        .map(|repo_path| {
            let name = display_name(root, repo_path);
            let path = repo_path.clone();
            Job::new(name, move || cleanup_repo(ctx, &path))
        })
        .collect();
    run_with_progress("repo cleanup", jobs, ctx.jobs, &ctx.cancel)
}

fn driver(ctx: &CommandContext, repo_path: &Path) -> GitDriver {
    GitDriver::new(Arc::clone(&ctx.executor), repo_path)
        .with_cancel(&ctx.cancel)
        .with_timeout(ctx.timeout)
}

fn gh_client(ctx: &CommandContext) -> GhClient {
    GhClient::new(
        Arc::clone(&ctx.executor),
        Arc::new(TokenSleeper::new(&ctx.cancel)),
    )
    .with_cancel(&ctx.cancel)
}

fn update_repo(ctx: &CommandContext, repo_path: &Path, options: &UpdateOptions) -> Result<()> {
    let git = driver(ctx, repo_path);
    let report = crate::repo::update(&git, options)?;

    for message in &report.skipped_messages {
        tracing::info!(repo = %repo_path.display(), "{message}");
    }
    if options.dry_run {
        for command in &report.commands {
            tracing::info!(repo = %repo_path.display(), "dry-run: {command}");
        }
    }
    Ok(())
}

fn cleanup_repo(ctx: &CommandContext, repo_path: &Path) -> Result<()> {
    let git = driver(ctx, repo_path);
    let policy = &ctx.config.repo.cleanup;

    // The squashed target needs the merged-PR head map before the engine
    // runs; merged-only runs never touch the host CLI.
    let mut squashed_pr_heads = BTreeMap::new();
    if wants_target(&policy.targets, "squashed") {
        let default_branch = crate::repo::detect_default_branch(&git)?;
        squashed_pr_heads = gh_client(ctx).list_merged_pr_heads(repo_path, &default_branch.branch)?;
    }

    let report = crate::repo::cleanup(
        &git,
        &CleanupOptions {
            prune: ctx.config.repo.update.prune,
            dry_run: ctx.dry_run,
            targets: policy.targets.clone(),
            exclude_branches: policy.exclude_branches.clone(),
            squashed_pr_heads,
        },
    )?;

    for message in &report.skipped_messages {
        tracing::info!(repo = %repo_path.display(), "{message}");
    }
    for plan in &report.planned_deletes {
        tracing::info!(
            repo = %repo_path.display(),
            "dry-run: {} を削除予定 ({})",
            plan.branch,
            plan.target.as_str()
        );
    }
    for deleted in &report.deleted_branches {
        tracing::info!(repo = %repo_path.display(), "削除: {}", deleted.branch);
    }
    for error in &report.errors {
        tracing::warn!(repo = %repo_path.display(), "{error}");
    }

    match report.delete_error() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Outcome of the GitHub clone bootstrap.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootstrapResult {
    /// Repositories present locally (pre-existing or freshly cloned).
    pub ready_paths: Vec<PathBuf>,
    /// Clones that were only planned because of dry-run.
    pub planned_only: usize,
}

/// Pick the clone URL for the configured protocol, falling back to HTTPS
/// when no SSH URL is available.
#[must_use]
pub fn select_clone_url(protocol: &str, repo: &GithubRepo) -> String {
    if protocol == "ssh" && !repo.ssh_url.is_empty() {
        return repo.ssh_url.clone();
    }
    repo.url.clone()
}

/// Clone the owner's missing repositories under `root`.
///
/// Archived repositories are skipped; existing working copies are counted
/// as ready. In dry-run clones are planned, not executed. A single failing
/// clone is logged and skipped so the rest of the run proceeds.
///
/// # Errors
///
/// Fails when the repository listing itself fails.
pub fn bootstrap_repos(
    root: &Path,
    config: &Config,
    dry_run: bool,
    list_repos: impl Fn() -> Result<Vec<GithubRepo>>,
    clone: impl Fn(&str, &Path) -> Result<()>,
) -> Result<BootstrapResult> {
    let mut result = BootstrapResult::default();
    if config.repo.github.owner.is_empty() {
        return Ok(result);
    }

    let repos = list_repos()?;
    for repo in repos {
        if repo.is_archived || repo.name.is_empty() {
            continue;
        }
        let target = root.join(&repo.name);
        if target.join(".git").exists() {
            result.ready_paths.push(target);
            continue;
        }

        let url = select_clone_url(&config.repo.github.protocol, &repo);
        if dry_run {
            tracing::info!(repo = %repo.name, %url, "clone 予定 (dry-run)");
            result.planned_only += 1;
            continue;
        }

        match clone(&url, &target) {
            Ok(()) => result.ready_paths.push(target),
            Err(error) => {
                tracing::warn!(
                    repo = %repo.name,
                    error = %format!("{error:#}"),
                    "clone に失敗したためスキップします"
                );
            }
        }
    }

    Ok(result)
}
