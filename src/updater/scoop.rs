//! Scoop adapter (Windows user-land package manager).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome, table,
};

/// Adapter for `scoop`.
#[derive(Debug, Default)]
pub struct ScoopUpdater;

/// A separator line: non-empty, only dashes and spaces, at least one dash.
fn is_separator(line: &str) -> bool {
    !line.is_empty() && line.contains('-') && line.chars().all(|c| c == '-' || c == ' ')
}

impl ScoopUpdater {
    /// Parse `scoop status` output.
    ///
    /// The header line sits directly above the dashes separator; column
    /// names may span multiple words, so columns are detected at tokens
    /// preceded by two or more spaces.
    fn parse_status_output(output: &str) -> Vec<PackageInfo> {
        let lines: Vec<&str> = output.lines().collect();
        let Some(separator_index) = lines.iter().position(|line| is_separator(line)) else {
            return Vec::new();
        };
        let Some(header) = separator_index
            .checked_sub(1)
            .and_then(|index| lines.get(index))
        else {
            return Vec::new();
        };

        let positions = table::detect_wide_column_positions(header);
        if positions.len() < 3 {
            return Vec::new();
        }

        let mut packages = Vec::new();
        for line in lines.iter().skip(separator_index + 1) {
            if line.trim().is_empty() {
                continue;
            }
            let cells = table::slice_columns(line, &positions);
            let name = cells.first().cloned().unwrap_or_default();
            let current = cells.get(1).cloned().unwrap_or_default();
            let latest = cells.get(2).cloned().unwrap_or_default();
            if name.is_empty() || current.is_empty() || latest.is_empty() {
                continue;
            }
            packages.push(PackageInfo::upgrade(name, current, latest));
        }
        packages
    }
}

impl Updater for ScoopUpdater {
    fn name(&self) -> &'static str {
        "scoop"
    }

    fn display_name(&self) -> &'static str {
        "Scoop"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let output = ctx.run_output("scoop", ["status"])?;
        let packages = Self::parse_status_output(&output);
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
                message: Some("Scoop 管理下のパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("scoop", ["update", "--all"])?;

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
