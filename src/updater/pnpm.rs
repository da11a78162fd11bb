//! pnpm global packages adapter.
use anyhow::{Result, anyhow};

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `pnpm` global packages.
#[derive(Debug, Default)]
pub struct PnpmUpdater;

impl PnpmUpdater {
    /// Parse `pnpm outdated --global --format json`.
    ///
    /// pnpm emits either an array of entries (with `name` or
    /// `packageName`) or an object keyed by package name; both shapes are
    /// accepted. Empty input is fine; invalid JSON is an error.
    ///
    /// # Errors
    ///
    /// Fails with "JSON の解析に失敗" on invalid JSON.
    fn parse_outdated_json(output: &str) -> Result<Vec<PackageInfo>> {
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(output)
            .map_err(|error| anyhow!("JSON の解析に失敗しました: {error}"))?;

        let mut packages = Vec::new();
        match value {
            serde_json::Value::Array(entries) => {
                for entry in entries {
                    let name = entry
                        .get("name")
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .or_else(|| {
                            entry
                                .get("packageName")
                                .and_then(|v| v.as_str())
                                .filter(|s| !s.is_empty())
                        });
                    let Some(name) = name else { continue };
                    packages.push(entry_package(name, &entry));
                }
            }
            serde_json::Value::Object(entries) => {
                for (name, entry) in entries {
                    if name.is_empty() {
                        continue;
                    }
                    packages.push(entry_package(&name, &entry));
                }
            }
            _ => {}
        }
        Ok(packages)
    }
}

fn entry_package(name: &str, entry: &serde_json::Value) -> PackageInfo {
    let current = entry.get("current").and_then(|v| v.as_str());
    let new = entry
        .get("latest")
        .and_then(|v| v.as_str())
        .or_else(|| entry.get("wanted").and_then(|v| v.as_str()));
    PackageInfo {
        name: name.to_string(),
        current_version: current.map(ToString::to_string),
        new_version: new.map(ToString::to_string),
    }
}

impl Updater for PnpmUpdater {
    fn name(&self) -> &'static str {
        "pnpm"
    }

    fn display_name(&self) -> &'static str {
        "pnpm (Node.js グローバルパッケージ)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        // Like npm, a non-zero exit signals "updates exist".
        let result = ctx.run_unchecked("pnpm", ["outdated", "--global", "--format", "json"])?;
        let packages = Self::parse_outdated_json(&result.stdout)?;
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
                message: Some("pnpm グローバルパッケージは最新です".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("pnpm", ["update", "--global"])?;

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

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<PackageInfo>> {
        PnpmUpdater::parse_outdated_json(input)
    }

    #[test]
    fn identity_and_labels() {
        let updater = PnpmUpdater;
        assert_eq!(updater.name(), "pnpm");
        assert_eq!(updater.display_name(), "pnpm (Node.js グローバルパッケージ)");
    }

    #[test]
    fn configure_accepts_unknown_keys() {
        let mut updater = PnpmUpdater;
        let mut options = crate::config::ManagerConfig::new();
        options.insert("dummy".to_string(), toml::Value::Boolean(true));
        updater.configure(&options);
    }

    #[test]
    fn empty_output_is_fine() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse("{invalid").unwrap_err();
        assert!(err.to_string().contains("JSON の解析に失敗"));
    }

    #[test]
    fn array_form() {
        let input = r#"[
  {"name":"typescript","current":"5.1.0","latest":"5.2.0"},
  {"packageName":"@scope/pkg","current":"1.0.0","wanted":"1.1.0"}
]"#;
        let got = parse(input).unwrap();
        assert_eq!(got.len(), 2);

        let typescript = got.iter().find(|p| p.name == "typescript").unwrap();
        assert_eq!(typescript.current_version.as_deref(), Some("5.1.0"));
        assert_eq!(typescript.new_version.as_deref(), Some("5.2.0"));

        let scoped = got.iter().find(|p| p.name == "@scope/pkg").unwrap();
        assert_eq!(scoped.current_version.as_deref(), Some("1.0.0"));
        assert_eq!(scoped.new_version.as_deref(), Some("1.1.0"));
    }

    #[test]
    fn object_form() {
        let input = r#"{
  "eslint": {"current":"8.0.0","latest":"9.0.0"},
  "pnpm": {"current":"9.0.0","wanted":"9.1.0"}
}"#;
        let got = parse(input).unwrap();
        assert_eq!(got.len(), 2);

        let eslint = got.iter().find(|p| p.name == "eslint").unwrap();
        assert_eq!(eslint.new_version.as_deref(), Some("9.0.0"));

        let pnpm = got.iter().find(|p| p.name == "pnpm").unwrap();
        assert_eq!(pnpm.new_version.as_deref(), Some("9.1.0"));
    }

    #[test]
    fn array_entries_without_a_name_are_skipped() {
        let input = r#"[{"name":"", "packageName":"", "current":"1.0.0", "latest":"2.0.0"}]"#;
        assert!(parse(input).unwrap().is_empty());
    }
}
