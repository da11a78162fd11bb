//! pipx adapter (Python applications in isolated venvs).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `pipx`.
#[derive(Debug, Default)]
pub struct PipxUpdater;

impl PipxUpdater {
    /// Parse `pipx list --json`: installed packages live under
    /// `venvs.<name>.metadata.main_package.package_version`. Unparsable or
    /// empty input yields no packages.
    fn parse_list_json(output: &str) -> Vec<PackageInfo> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(output) else {
            return Vec::new();
        };
        let Some(venvs) = value.get("venvs").and_then(|v| v.as_object()) else {
            return Vec::new();
        };

        let mut packages = Vec::new();
        for (name, venv) in venvs {
            if name.is_empty() {
                continue;
            }
            let version = venv
                .get("metadata")
                .and_then(|v| v.get("main_package"))
                .and_then(|v| v.get("package_version"))
                .and_then(|v| v.as_str());
            packages.push(PackageInfo {
                name: name.clone(),
                current_version: version.map(ToString::to_string),
                new_version: None,
            });
        }
        packages
    }
}

impl Updater for PipxUpdater {
    fn name(&self) -> &'static str {
        "pipx"
    }

    fn display_name(&self) -> &'static str {
        "pipx (Python アプリケーション)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("pipx", ["list", "--json"])?;
        let packages = Self::parse_list_json(&output);
        let count = packages.len();
        Ok(CheckResult {
            available_updates: count,
            packages,
            message: Some(format!(
                "{count} 件のアプリケーションを pipx upgrade-all で更新します"
            )),
        })
    }

    fn update(&self, ctx: &UpdaterContext, opts: &UpdateOptions) -> Result<UpdateOutcome> {
        let check = self.check(ctx)?;
        if opts.dry_run {
            return Ok(dry_run_outcome(check));
        }
        if check.packages.is_empty() {
            return Ok(UpdateOutcome {
                message: Some("pipx でインストールされたアプリケーションはありません".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("pipx", ["upgrade-all"])?;

        Ok(UpdateOutcome {
            updated_count: check.packages.len(),
            packages: check.packages,
            errors: Vec::new(),
            message: Some("pipx upgrade-all を実行しました".to_string()),
        })
    }
}
