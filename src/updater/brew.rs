//! Homebrew adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `brew`.
#[derive(Debug, Default)]
pub struct BrewUpdater;

impl BrewUpdater {
    /// Parse `brew outdated --verbose` rows:
    /// `name (current[, more]) < new`. Rows without the `<` marker are
    /// dropped; only the first installed version is kept.
    fn parse_outdated_output(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let line = line.trim();
            let Some((head, new)) = line.split_once('<') else {
                continue;
            };
            let Some((name, currents)) = head.split_once(" (") else {
                continue;
            };
            let currents = currents.trim_end().trim_end_matches(')');
            let current = currents.split(',').next().unwrap_or_default().trim();
            let name = name.trim();
            let new = new.trim();
            if name.is_empty() || current.is_empty() || new.is_empty() {
                continue;
            }
            packages.push(PackageInfo::upgrade(name, current, new));
        }
        packages
    }
}

impl Updater for BrewUpdater {
    fn name(&self) -> &'static str {
        "brew"
    }

    fn display_name(&self) -> &'static str {
        "Homebrew"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("brew", ["outdated", "--verbose"])?;
        let packages = Self::parse_outdated_output(&output);
        Ok(CheckResult {
            available_updates: packages.len(),
            packages,
            message: None,
        })
    }

    fn update(&self, ctx: &UpdaterContext, opts: &UpdateOptions) -> Result<UpdateOutcome> {
        let check = self.check(ctx)?;
        if opts.dry_run {
            return Ok(dry_run_outcome(check));
        }
        if check.available_updates == 0 {
            return Ok(UpdateOutcome {
                message: Some("Homebrew パッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("brew", ["update"])?;
        ctx.run("brew", ["upgrade"])?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!(
                "{} 件のパッケージを更新しました",
                check.available_updates
            )),
        })
    }
}
