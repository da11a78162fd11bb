//! nvm adapter (Node.js version management).
use anyhow::{Context as _, Result, anyhow};

use super::semver::{extract_all_semvers, extract_semver, is_semver_less, max_semver};
use super::{CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext};

/// Adapter for `nvm`.
#[derive(Debug, Default)]
pub struct NvmUpdater;

/// The in-use Node.js version from `nvm current` output.
///
/// `none`, `n/a` and anything mentioning `system` mean "not managed by
/// nvm" and yield `None`.
///
/// # Errors
///
/// Fails when the output is non-empty but carries no recognisable version.
fn parse_current_version(output: &str) -> Result<Option<String>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let lower = trimmed.to_lowercase();
    if lower == "none" || lower == "n/a" || lower.contains("system") {
        return Ok(None);
    }

    extract_semver(trimmed)
        .map(Some)
        .ok_or_else(|| anyhow!("バージョン形式を解釈できません: {trimmed}"))
}

/// The newest Node.js version found anywhere in a listing.
///
/// Handles both the Unix `ls-remote` column and the Windows
/// `list available` table; `iojs` rows are excluded. Returns `None` when
/// no version token appears.
fn parse_latest_version(output: &str) -> Option<String> {
    let mut versions = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.to_lowercase().contains("iojs") {
            continue;
        }
        versions.extend(extract_all_semvers(trimmed));
    }
    max_semver(&versions)
}

impl NvmUpdater {
    fn current_version(&self, ctx: &UpdaterContext) -> Result<Option<String>> {
        let output = self
            .run_nvm(ctx, &["current"])
            .context("nvm current の実行に失敗")?;
        parse_current_version(&output).context("nvm current の出力解析に失敗")
    }

    /// Try the listing candidates in order until one yields a version.
    fn latest_version(&self, ctx: &UpdaterContext) -> Result<String> {
        let candidates: [&[&str]; 3] = [
            &["list", "available"],
            &["ls-remote", "--no-colors", "--lts"],
            &["ls-remote", "--no-colors"],
        ];

        let mut failures = Vec::new();
        for args in candidates {
            match self.run_nvm(ctx, args) {
                Ok(output) => {
                    if let Some(version) = parse_latest_version(&output) {
                        return Ok(version);
                    }
                    failures.push(format!(
                        "nvm {}: バージョンを検出できませんでした",
                        args.join(" ")
                    ));
                }
                Err(error) => failures.push(format!("nvm {}: {error:#}", args.join(" "))),
            }
        }

        Err(anyhow!(
            "最新 Node.js バージョンの取得に失敗: {}",
            failures.join(" / ")
        ))
    }

    fn run_nvm(&self, ctx: &UpdaterContext, args: &[&str]) -> Result<String> {
        // Force the C locale so the listings are parseable.
        let request = ctx
            .request("nvm", args.iter().copied())
            .env("LANG", "C")
            .env("LC_ALL", "C");
        Ok(ctx.executor.run(&request)?.stdout)
    }
}

impl Updater for NvmUpdater {
    fn name(&self) -> &'static str {
        "nvm"
    }

    fn display_name(&self) -> &'static str {
        "nvm (Node.js バージョン管理)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let current = self.current_version(ctx)?;
        let latest = self.latest_version(ctx)?;

        let Some(current) = current else {
            return Ok(CheckResult {
                available_updates: 1,
                packages: vec![PackageInfo::install("node", latest)],
                message: Some(
                    "現在の Node.js バージョンを検出できなかったため、最新バージョンの導入を提案します"
                        .to_string(),
                ),
            });
        };

        let needs_update =
            is_semver_less(&current, &latest).context("nvm バージョン比較に失敗")?;
        if !needs_update {
            return Ok(CheckResult::default());
        }

        Ok(CheckResult {
            available_updates: 1,
            packages: vec![PackageInfo::upgrade("node", current, latest)],
            message: None,
        })
    }

    fn update(&self, ctx: &UpdaterContext, opts: &UpdateOptions) -> Result<UpdateOutcome> {
        let check = self.check(ctx)?;

        if check.available_updates == 0 {
            return Ok(UpdateOutcome {
                message: Some("nvm 管理下の Node.js は最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        if opts.dry_run {
            return Ok(UpdateOutcome {
                updated_count: 0,
                message: Some(format!(
                    "{} 件の Node.js バージョン更新が可能です（DryRunモード）",
                    check.available_updates
                )),
                packages: check.packages,
                errors: Vec::new(),
            });
        }

        let target = check
            .packages
            .first()
            .and_then(|package| package.new_version.clone())
            .ok_or_else(|| anyhow!("更新対象のバージョンが特定できません"))?;

        if let Err(error) = self.run_nvm(ctx, &["install", target.as_str()]) {
            return Err(error.context(format!("nvm install {target} に失敗")));
        }

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!("Node.js {target} をインストールしました")),
        })
    }
}
