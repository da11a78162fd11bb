//! winget adapter (Windows package manager).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome, table,
};

/// Adapter for `winget`.
#[derive(Debug, Default)]
pub struct WingetUpdater;

impl WingetUpdater {
    /// Parse `winget upgrade` tabular output.
    ///
    /// The header may be localised (Japanese column names); positions are
    /// detected per output and applied with bounds-safe slicing. Summary
    /// lines and progress-bar noise are ignored.
    fn parse_upgrade_output(output: &str) -> Vec<PackageInfo> {
        let lines = table::split_lines(output);
        let mut rows = lines.into_iter();

        let header = loop {
            let Some(line) = rows.next() else {
                return Vec::new();
            };
            if table::is_summary_line(line) || table::is_all_dashes(line) {
                continue;
            }
            break line;
        };

        let positions = table::detect_column_positions(header);
        if positions.len() < 4 {
            return Vec::new();
        }

        let mut packages = Vec::new();
        for line in rows {
            if table::is_summary_line(line) || table::is_all_dashes(line) {
                continue;
            }
            let cells = table::slice_columns(line, &positions);
            let name = cells.first().cloned().unwrap_or_default();
            let current = cells.get(2).cloned().unwrap_or_default();
            let available = cells.get(3).cloned().unwrap_or_default();
            if name.is_empty() || current.is_empty() || available.is_empty() {
                continue;
            }
            packages.push(PackageInfo::upgrade(name, current, available));
        }
        packages
    }
}

impl Updater for WingetUpdater {
    fn name(&self) -> &'static str {
        "winget"
    }

    fn display_name(&self) -> &'static str {
        "winget (Windows パッケージ)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        // winget exits non-zero when nothing is upgradable; parse whatever
        // came back on stdout.
        let result = ctx.run_unchecked(
            "winget",
            [
                "upgrade",
                "--include-unknown",
                "--accept-source-agreements",
                "--disable-interactivity",
            ],
        )?;
        let packages = Self::parse_upgrade_output(&result.stdout);
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
                message: Some("winget 管理下のパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run(
            "winget",
            [
                "upgrade",
                "--all",
                "--silent",
                "--accept-source-agreements",
                "--accept-package-agreements",
            ],
        )?;

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
