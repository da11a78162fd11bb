//! Package-manager sub-commands: check and update.
use std::sync::Arc;

use anyhow::Result;

use super::{CommandContext, run_with_progress};
use crate::runner::Job;
use crate::updater::{Registry, UpdateOptions, Updater, UpdaterContext};

fn updater_context(ctx: &CommandContext) -> UpdaterContext {
    UpdaterContext::new(
        Arc::clone(&ctx.executor),
        ctx.cancel.clone(),
        Some(ctx.timeout),
    )
}

fn configured_registry(ctx: &CommandContext) -> Registry {
    let mut registry = Registry::builtin();
    registry.configure(&ctx.config.sys.managers);
    registry
}

fn enabled_updaters<'a>(ctx: &CommandContext, registry: &'a Registry) -> Vec<&'a dyn Updater> {
    let (enabled, unknown) = registry.enabled(&ctx.config.sys.enable);
    for name in unknown {
        tracing::warn!(manager = %name, "未知の package manager 名のためスキップします");
    }
    enabled
}

/// `devsync sys check`: a non-mutating query per enabled adapter.
///
/// # Errors
///
/// Never fails per adapter; only configuration problems abort.
#[allow(clippy::print_stdout)]
pub fn check(ctx: &CommandContext) -> Result<()> {
    let registry = configured_registry(ctx);
    let enabled = enabled_updaters(ctx, &registry);
    if enabled.is_empty() {
        println!("有効な package manager が設定されていません (sys.enable)");
        return Ok(());
    }

    let updater_ctx = updater_context(ctx);
    for updater in enabled {
        if !updater.is_available(ctx.executor.as_ref()) {
            println!("{}: not available", updater.display_name());
            continue;
        }

        match updater.check(&updater_ctx) {
            Ok(result) => {
                println!(
                    "{}: {} 件の更新",
                    updater.display_name(),
                    result.available_updates
                );
                if let Some(message) = result.message {
                    println!("  {message}");
                }
                for package in result.packages {
                    let current = package.current_version.unwrap_or_else(|| "?".to_string());
                    let new = package.new_version.unwrap_or_else(|| "?".to_string());
                    println!("  {} {current} -> {new}", package.name);
                }
            }
            Err(error) => {
                tracing::warn!(
                    manager = updater.name(),
                    error = %format!("{error:#}"),
                    "チェックに失敗しました"
                );
            }
        }
    }
    Ok(())
}

/// `devsync sys update`: one runner job per enabled, available adapter.
///
/// # Errors
///
/// Fails with an aggregate count when any adapter job failed.
#[allow(clippy::print_stdout)]
pub fn update(ctx: &CommandContext) -> Result<()> {
    let registry = configured_registry(ctx);
    let enabled = enabled_updaters(ctx, &registry);
    if enabled.is_empty() {
        println!("有効な package manager が設定されていません (sys.enable)");
        return Ok(());
    }

    let updater_ctx = updater_context(ctx);
    let options = UpdateOptions {
        dry_run: ctx.dry_run,
    };

    let mut jobs: Vec<Job<'_>> = Vec::new();
    for updater in enabled {
        if !updater.is_available(ctx.executor.as_ref()) {
            tracing::info!(manager = updater.name(), "ツールが見つからないためスキップします");
            continue;
        }
        let job_ctx = updater_ctx.clone();
        jobs.push(Job::new(updater.display_name(), move || {
            let outcome = updater.update(&job_ctx, &options)?;
            if let Some(message) = &outcome.message {
                tracing::info!(manager = updater.name(), "{message}");
            }
            for error in &outcome.errors {
                tracing::warn!(manager = updater.name(), "{error}");
            }
            if outcome.errors.is_empty() {
                Ok(())
            } else {
                anyhow::bail!("{} 件の更新に失敗しました", outcome.errors.len())
            }
        }));
    }

    if jobs.is_empty() {
        println!("実行可能な package manager がありません");
        return Ok(());
    }

    let summary = run_with_progress("sys update", jobs, ctx.jobs, &ctx.cancel);
    if summary.failed > 0 {
        anyhow::bail!("{} 件の package manager 更新に失敗しました", summary.failed);
    }
    Ok(())
}
