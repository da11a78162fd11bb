//! uv tool adapter (Python CLI tools).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `uv tool`.
#[derive(Debug, Default)]
pub struct UvUpdater;

impl UvUpdater {
    /// Parse `uv tool list`: `name vX.Y.Z` headers with indented or
    /// `-`-prefixed binary lines below. Versions may carry a trailing
    /// colon or be missing altogether.
    fn parse_tool_list(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('-') {
                continue;
            }
            if trimmed.contains("No tools installed") {
                continue;
            }

            let mut tokens = trimmed.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            let version = tokens
                .next()
                .map(|token| token.trim_end_matches(':').trim_start_matches('v'))
                .filter(|version| !version.is_empty());

            let name = name.trim_end_matches(':');
            if name.is_empty() {
                continue;
            }
            packages.push(match version {
                Some(version) => PackageInfo::installed(name, version),
                None => PackageInfo {
                    name: name.to_string(),
                    ..PackageInfo::default()
                },
            });
        }
        packages
    }
}

impl Updater for UvUpdater {
    fn name(&self) -> &'static str {
        "uv"
    }

    fn display_name(&self) -> &'static str {
        "uv tool (Python CLI ツール)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("uv", ["tool", "list"])?;
        let packages = Self::parse_tool_list(&output);
        let count = packages.len();
        Ok(CheckResult {
            available_updates: count,
            packages,
            message: Some(format!(
                "{count} 件のツールを uv tool upgrade --all で更新します"
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
                message: Some("uv tool でインストールされたツールはありません".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("uv", ["tool", "upgrade", "--all"])?;

        Ok(UpdateOutcome {
            updated_count: check.packages.len(),
            packages: check.packages,
            errors: Vec::new(),
            message: Some("uv tool upgrade --all を実行しました".to_string()),
        })
    }
}
