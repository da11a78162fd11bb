//! RubyGems adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `gem`.
#[derive(Debug, Default)]
pub struct GemUpdater;

impl GemUpdater {
    /// Parse `gem outdated` lines: `name (current[, more] < new)`.
    ///
    /// A `label:` prefix on the current side (`default: 2.5.0`) is
    /// stripped, and only the first comma-separated current version is
    /// kept. Rows without `<` are dropped.
    fn parse_outdated_output(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let line = line.trim();
            let Some((name, rest)) = line.split_once(" (") else {
                continue;
            };
            let Some(inner) = rest.strip_suffix(')') else {
                continue;
            };
            let Some((current_side, new_side)) = inner.split_once('<') else {
                continue;
            };

            let current_side = current_side.trim();
            let current_side = current_side
                .rsplit_once(':')
                .map_or(current_side, |(_, tail)| tail.trim());
            let current = current_side
                .split(',')
                .next()
                .unwrap_or_default()
                .trim();
            let new = new_side.trim();

            if name.is_empty() || current.is_empty() || new.is_empty() {
                continue;
            }
            packages.push(PackageInfo::upgrade(name, current, new));
        }
        packages
    }
}

impl Updater for GemUpdater {
    fn name(&self) -> &'static str {
        "gem"
    }

    fn display_name(&self) -> &'static str {
        "gem (Ruby Gems)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("gem", ["outdated"])?;
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
                message: Some("gem 管理下のパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("gem", ["update"])?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!("{} 件の gem を更新しました", check.available_updates)),
        })
    }
}
