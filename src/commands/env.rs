//! Secret-injection sub-commands: export and run.
use std::sync::Arc;

use anyhow::Result;

use super::CommandContext;
use crate::cli::EnvRunOpts;
use crate::secret::{Injector, render_export_lines, run_with_env};

fn injector(ctx: &CommandContext) -> Injector {
    Injector::new(Arc::clone(&ctx.executor), ctx.config.secret.items.clone())
}

/// `devsync env export`: print `export KEY='value'` lines for `eval`.
///
/// Requires an unlocked session (`BW_SESSION`).
///
/// # Errors
///
/// Fails when the vault cannot be queried.
#[allow(clippy::print_stdout)]
pub fn export(ctx: &CommandContext) -> Result<()> {
    let (vars, stats) = injector(ctx).load_env()?;
    print!("{}", render_export_lines(&vars));
    tracing::info!(
        loaded = stats.loaded,
        skipped = stats.skipped,
        "シークレットをエクスポートしました"
    );
    Ok(())
}

/// `devsync env run -- <cmd>`: run a command with the loaded secrets
/// layered over the parent environment.
///
/// # Errors
///
/// Fails when secrets cannot be loaded, the command cannot be spawned, or
/// it exits non-zero.
pub fn run(ctx: &CommandContext, opts: &EnvRunOpts) -> Result<()> {
    let (vars, _) = injector(ctx).load_env()?;
    let code = run_with_env(&opts.args, &vars)?;
    if code != 0 {
        anyhow::bail!("コマンドが終了コード {code} で終了しました");
    }
    Ok(())
}
