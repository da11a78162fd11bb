//! Snap adapter (Ubuntu snapd).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `snap`.
#[derive(Debug, Default)]
pub struct SnapUpdater;

impl SnapUpdater {
    /// Parse `snap refresh --list` output.
    ///
    /// Rows are `Name  Version  Rev  Publisher  Notes`; the version column
    /// is the candidate version. The header and the all-up-to-date notice
    /// are skipped.
    fn parse_refresh_list(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with("Name")
                || trimmed.starts_with("All snaps up to date")
            {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            match tokens.next() {
                Some(version) => packages.push(PackageInfo::install(name, version)),
                None => packages.push(PackageInfo {
                    name: name.to_string(),
                    ..PackageInfo::default()
                }),
            }
        }
        packages
    }
}

impl Updater for SnapUpdater {
    fn name(&self) -> &'static str {
        "snap"
    }

    fn display_name(&self) -> &'static str {
        "Snap"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        // `snap refresh --list` exits non-zero on some snapd versions when
        // nothing is refreshable; stdout still carries the notice.
        let result = ctx.run_unchecked("snap", ["refresh", "--list"])?;
        let packages = Self::parse_refresh_list(&result.stdout);
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
                message: Some("snap 管理下のパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("sudo", ["snap", "refresh"])?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!(
                "{} 件のスナップを更新しました",
                check.available_updates
            )),
        })
    }
}
