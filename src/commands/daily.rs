//! The daily refresh: unlock secrets, load env, update packages, sync
//! repositories.
use anyhow::{Context as _, Result};

use super::CommandContext;
use crate::cli::RepoUpdateOpts;
use crate::secret::{Injector, LoadStats, SESSION_ENV};

/// The orchestrated steps, injectable so the sequencing is testable
/// without real subsystems.
pub struct DailySteps<'a> {
    /// Unlock the vault and export the session.
    pub unlock: Box<dyn FnMut() -> Result<()> + 'a>,
    /// Load secrets into the process environment.
    pub load_env: Box<dyn FnMut() -> Result<LoadStats> + 'a>,
    /// Update every enabled package manager.
    pub sys_update: Box<dyn FnMut() -> Result<()> + 'a>,
    /// Bootstrap + update + cleanup of the repository root.
    pub repo_update: Box<dyn FnMut() -> Result<()> + 'a>,
}

impl std::fmt::Debug for DailySteps<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailySteps")
            .field("unlock", &"<dyn FnMut>")
            .field("load_env", &"<dyn FnMut>")
            .field("sys_update", &"<dyn FnMut>")
            .field("repo_update", &"<dyn FnMut>")
            .finish()
    }
}

/// Sequence the daily run.
///
/// Unlock failure aborts immediately. A secret-loading failure is logged
/// and the run continues (an empty vault must not break the refresh).
/// System-update and repo-sync failures abort with their stage message.
///
/// # Errors
///
/// Fails on unlock failure, or when the sys or repo stage fails.
pub fn run_daily(steps: &mut DailySteps<'_>) -> Result<()> {
    (steps.unlock)()?;

    match (steps.load_env)() {
        Ok(stats) => {
            tracing::info!(
                loaded = stats.loaded,
                skipped = stats.skipped,
                "シークレットを読み込みました"
            );
        }
        Err(error) => {
            tracing::warn!(
                error = %format!("{error:#}"),
                "環境変数の読み込みに失敗しました（継続します）"
            );
        }
    }

    (steps.sys_update)().context("システム更新に失敗しました")?;
    (steps.repo_update)().context("リポジトリ同期に失敗しました")?;

    Ok(())
}

/// `devsync run`: assemble the real steps and sequence them.
///
/// # Errors
///
/// See [`run_daily`].
pub fn run(ctx: &CommandContext) -> Result<()> {
    let injector = Injector::new(
        std::sync::Arc::clone(&ctx.executor),
        ctx.config.secret.items.clone(),
    );

    let mut steps = DailySteps {
        unlock: Box::new(|| {
            if ctx.config.secret.items.is_empty() {
                tracing::debug!("secret.items が空のためアンロックをスキップします");
                return Ok(());
            }
            let token = injector.unlock()?;
            export_process_env(SESSION_ENV, &token);
            Ok(())
        }),
        load_env: Box::new(|| {
            if ctx.config.secret.items.is_empty() {
                return Ok(LoadStats::default());
            }
            let (vars, stats) = injector.load_env()?;
            for (key, value) in &vars {
                export_process_env(key, value);
            }
            Ok(stats)
        }),
        sys_update: Box::new(|| super::sys::update(ctx)),
        repo_update: Box::new(|| super::repo::update(ctx, &RepoUpdateOpts::default())),
    };

    run_daily(&mut steps)
}

/// Export one variable into this process before any worker starts.
fn export_process_env(key: &str, value: &str) {
    // SAFETY: called from the single-threaded orchestration phase, before
    // the job runner spawns any worker thread.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var(key, value);
    }
}
