//! Cargo-installed binaries adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `cargo install`-managed tools.
#[derive(Debug, Default)]
pub struct CargoUpdater;

impl CargoUpdater {
    /// Parse `cargo install --list`.
    ///
    /// Header lines are `name vX.Y.Z:` (the `v` prefix is optional); rows
    /// without a trailing colon and indented binary lines are skipped.
    fn parse_install_list(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            let trimmed = line.trim_end();
            let Some(head) = trimmed.strip_suffix(':') else {
                continue;
            };

            let mut tokens = head.split_whitespace();
            let (Some(name), Some(version), None) = (tokens.next(), tokens.next(), tokens.next())
            else {
                continue;
            };
            let version = version.trim_start_matches('v');
            if name.is_empty() || version.is_empty() {
                continue;
            }
            packages.push(PackageInfo::installed(name, version));
        }
        packages
    }
}

impl Updater for CargoUpdater {
    fn name(&self) -> &'static str {
        "cargo"
    }

    fn display_name(&self) -> &'static str {
        "cargo (Rust CLI ツール)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("cargo", ["install", "--list"])?;
        let packages = Self::parse_install_list(&output);
        let count = packages.len();
        Ok(CheckResult {
            available_updates: count,
            packages,
            message: Some(format!(
                "{count} 件のインストール済みツールを検出しました（最新かどうかは cargo-update が判定します）"
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
                message: Some("cargo でインストールされたツールはありません".to_string()),
                ..UpdateOutcome::default()
            });
        }

        // Bulk upgrades come from the cargo-update plugin; without it there
        // is nothing safe to run unattended.
        if !ctx.executor.which("cargo-install-update") {
            anyhow::bail!(
                "cargo-update がインストールされていません (`cargo install cargo-update`)"
            );
        }

        ctx.run("cargo", ["install-update", "--all"])?;

        Ok(UpdateOutcome {
            updated_count: check.packages.len(),
            packages: check.packages,
            errors: Vec::new(),
            message: Some("cargo install-update --all を実行しました".to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<PackageInfo> {
        CargoUpdater::parse_install_list(input)
    }

    #[test]
    fn empty_output() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn single_package() {
        let got = parse("ripgrep v13.0.0:\n    rg\n");
        assert_eq!(got, vec![PackageInfo::installed("ripgrep", "13.0.0")]);
        assert!(got[0].new_version.is_none());
    }

    #[test]
    fn multiple_packages_with_blank_lines() {
        let input = "ripgrep v13.0.0:\n    rg\n\ncargo-update v16.0.0:\n    cargo-install-update\n    cargo-install-update-config\n";
        assert_eq!(
            parse(input),
            vec![
                PackageInfo::installed("ripgrep", "13.0.0"),
                PackageInfo::installed("cargo-update", "16.0.0"),
            ]
        );
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let input = "no-colon-line\npkg-only:\npkg 1.2.3\npkg 1.2.3:\n    bin\n";
        assert_eq!(parse(input), vec![PackageInfo::installed("pkg", "1.2.3")]);
    }

    #[test]
    fn version_without_v_prefix() {
        assert_eq!(parse("pkg 1.2.3:\n    bin\n"), vec![PackageInfo::installed("pkg", "1.2.3")]);
    }

    #[test]
    fn identity_and_labels() {
        let updater = CargoUpdater;
        assert_eq!(updater.name(), "cargo");
        assert_eq!(updater.display_name(), "cargo (Rust CLI ツール)");
    }

    #[test]
    fn update_requires_the_cargo_update_plugin() {
        use crate::cancel::CancelToken;
        use crate::exec::Executor;
        use crate::exec::test_helpers::MockExecutor;
        use std::sync::Arc;

        let mock = Arc::new(MockExecutor::ok("ripgrep v13.0.0:\n    rg\n").with_which(false));
        let ctx = UpdaterContext::new(
            Arc::clone(&mock) as Arc<dyn Executor>,
            CancelToken::new(),
            None,
        );

        let err = CargoUpdater
            .update(&ctx, &UpdateOptions { dry_run: false })
            .unwrap_err();
        assert!(err.to_string().contains("cargo-update がインストールされていません"));
    }
}
