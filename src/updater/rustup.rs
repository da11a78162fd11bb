//! Rust toolchain adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `rustup`.
#[derive(Debug, Default)]
pub struct RustupUpdater;

/// Strip trailing parenthesised info: `2025-01-01 (abcd123)` → `2025-01-01`.
fn bare_version(text: &str) -> String {
    text.split('(').next().unwrap_or_default().trim().to_string()
}

impl RustupUpdater {
    /// Parse `rustup check`: `component - Update available : A -> B`.
    /// "Up to date" lines and anything malformed are dropped.
    fn parse_check_output(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let Some((name, rest)) = line.split_once(" - ") else {
                continue;
            };
            if !rest.trim_start().starts_with("Update available") {
                continue;
            }
            let Some((_, versions)) = rest.split_once(':') else {
                continue;
            };
            let Some((current, new)) = versions.split_once("->") else {
                continue;
            };

            let name = name.trim();
            let current = bare_version(current);
            let new = bare_version(new);
            if name.is_empty() || current.is_empty() || new.is_empty() {
                continue;
            }
            packages.push(PackageInfo::upgrade(name, current, new));
        }
        packages
    }
}

impl Updater for RustupUpdater {
    fn name(&self) -> &'static str {
        "rustup"
    }

    fn display_name(&self) -> &'static str {
        "rustup (Rust ツールチェーン)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("rustup", ["check"])?;
        let packages = Self::parse_check_output(&output);
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
                message: Some("ツールチェーンは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("rustup", ["update"])?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!(
                "{} 件のツールチェーンを更新しました",
                check.available_updates
            )),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<PackageInfo> {
        RustupUpdater::parse_check_output(input)
    }

    #[test]
    fn identity_and_labels() {
        let updater = RustupUpdater;
        assert_eq!(updater.name(), "rustup");
        assert_eq!(updater.display_name(), "rustup (Rust ツールチェーン)");
    }

    #[test]
    fn empty_output() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn up_to_date_lines_are_dropped() {
        let input = "stable-x86_64-unknown-linux-gnu - Up to date : 1.81.0\nrustup - Up to date : 1.28.1\n";
        assert!(parse(input).is_empty());
    }

    #[test]
    fn update_available_lines() {
        let input = "stable-x86_64-unknown-linux-gnu - Update available : 1.81.0 -> 1.82.0\nrustup - Update available : 1.28.1 -> 1.29.0\n";
        assert_eq!(
            parse(input),
            vec![
                PackageInfo::upgrade("stable-x86_64-unknown-linux-gnu", "1.81.0", "1.82.0"),
                PackageInfo::upgrade("rustup", "1.28.1", "1.29.0"),
            ]
        );
    }

    #[test]
    fn trailing_parenthesised_info_is_stripped() {
        let input = "nightly-x86_64-unknown-linux-gnu - Update available : 2025-01-01 (abcd123) -> 2025-01-08 (efgh456)\n";
        assert_eq!(
            parse(input),
            vec![PackageInfo::upgrade(
                "nightly-x86_64-unknown-linux-gnu",
                "2025-01-01",
                "2025-01-08"
            )]
        );
    }

    #[test]
    fn malformed_rows_are_dropped() {
        assert!(parse("broken line\ntoolchain - Update available\n").is_empty());
    }
}
