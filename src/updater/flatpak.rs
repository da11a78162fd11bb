//! Flatpak adapter.
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext, config_bool,
    dry_run_outcome,
};
use crate::config::ManagerConfig;

/// Adapter for `flatpak`.
#[derive(Debug, Default)]
pub struct FlatpakUpdater {
    /// Operate on the user installation (`--user`) instead of the system
    /// one.
    use_user: bool,
}

impl FlatpakUpdater {
    /// Prefix `--user` when the user installation is selected.
    fn build_command_args(&self, args: &[&str]) -> Vec<String> {
        let mut command = Vec::with_capacity(args.len() + 1);
        if self.use_user {
            command.push("--user".to_string());
        }
        command.extend(args.iter().map(ToString::to_string));
        command
    }

    /// Parse `flatpak remote-ls --updates`: first token is the app id,
    /// second (when present) the version. Header and blank lines are
    /// skipped.
    fn parse_remote_ls_output(output: &str) -> Vec<PackageInfo> {
        let mut packages = Vec::new();
        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("Application ID") {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            packages.push(match tokens.next() {
                Some(version) => PackageInfo::install(name, version),
                None => PackageInfo {
                    name: name.to_string(),
                    ..PackageInfo::default()
                },
            });
        }
        packages
    }
}

impl Updater for FlatpakUpdater {
    fn name(&self) -> &'static str {
        "flatpak"
    }

    fn display_name(&self) -> &'static str {
        "Flatpak"
    }

    fn configure(&mut self, options: &ManagerConfig) {
        // `use_user` wins over the legacy `user` alias when both appear.
        if let Some(value) = config_bool(options, "use_user") {
            self.use_user = value;
        } else if let Some(value) = config_bool(options, "user") {
            self.use_user = value;
        }
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let args = self.build_command_args(&["remote-ls", "--updates"]);
        let output = ctx.run_output("flatpak", args)?;
        let packages = Self::parse_remote_ls_output(&output);
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
                message: Some("Flatpak アプリケーションは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("flatpak", self.build_command_args(&["update", "-y"]))?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!(
                "{} 件のアプリケーションを更新しました",
                check.available_updates
            )),
        })
    }
}
