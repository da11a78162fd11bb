//! APT adapter (Debian/Ubuntu).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `apt`.
#[derive(Debug, Default)]
pub struct AptUpdater;

impl AptUpdater {
    /// Parse `apt list --upgradable` rows:
    /// `name/suite version arch [upgradable from: old]`.
    ///
    /// The `Listing...` banner and rows without a `/` are skipped.
    fn parse_upgradable_output(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("Listing") {
                continue;
            }
            let Some((name, rest)) = trimmed.split_once('/') else {
                continue;
            };
            let Some(new_version) = rest.split_whitespace().nth(1) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let current = trimmed
                .split_once("upgradable from: ")
                .map(|(_, tail)| tail.trim_end_matches(']').trim());

            packages.push(PackageInfo {
                name: name.to_string(),
                current_version: current.map(ToString::to_string),
                new_version: Some(new_version.to_string()),
            });
        }
        packages
    }
}

impl Updater for AptUpdater {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn display_name(&self) -> &'static str {
        "APT (Debian/Ubuntu)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("apt", ["list", "--upgradable"])?;
        let packages = Self::parse_upgradable_output(&output);
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
                message: Some("APT パッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("sudo", ["apt-get", "update"])?;
        ctx.run("sudo", ["apt-get", "upgrade", "-y"])?;

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
