//! npm global packages adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `npm` global packages.
#[derive(Debug, Default)]
pub struct NpmUpdater;

impl NpmUpdater {
    /// Parse `npm outdated -g --json`: an object keyed by package name
    /// with `current`/`wanted`/`latest` fields. Unparsable or empty input
    /// yields no packages.
    fn parse_outdated_json(output: &str) -> Vec<PackageInfo> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(output) else {
            return Vec::new();
        };
        let Some(entries) = value.as_object() else {
            return Vec::new();
        };

        let mut packages = Vec::new();
        for (name, entry) in entries {
            if name.is_empty() {
                continue;
            }
            let current = entry.get("current").and_then(|v| v.as_str());
            let new = entry
                .get("latest")
                .and_then(|v| v.as_str())
                .or_else(|| entry.get("wanted").and_then(|v| v.as_str()));
            packages.push(PackageInfo {
                name: name.clone(),
                current_version: current.map(ToString::to_string),
                new_version: new.map(ToString::to_string),
            });
        }
        packages
    }
}

impl Updater for NpmUpdater {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn display_name(&self) -> &'static str {
        "npm (Node.js グローバルパッケージ)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        // `npm outdated` exits 1 whenever updates exist; the JSON is on
        // stdout either way.
        let result = ctx.run_unchecked("npm", ["outdated", "-g", "--json"])?;
        let packages = Self::parse_outdated_json(&result.stdout);
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
                message: Some("npm グローバルパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("npm", ["update", "-g"])?;

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
