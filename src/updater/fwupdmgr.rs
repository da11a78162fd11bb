//! fwupdmgr adapter (Linux firmware updates).
use anyhow::Result;

use super::{
    CheckResult, PackageInfo, UpdateOptions, UpdateOutcome, Updater, UpdaterContext,
    dry_run_outcome,
};

/// Adapter for `fwupdmgr`.
#[derive(Debug, Default)]
pub struct FwupdmgrUpdater;

/// Whether fwupdmgr's failure output actually means "nothing to update".
fn is_no_updates_message(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("no updatable devices")
        || lower.contains("no updates available")
        || lower.contains("no upgrades for")
}

/// Pick the first present string field, accepting both key casings that
/// fwupdmgr emits across versions.
fn string_field<'a>(value: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
}

impl FwupdmgrUpdater {
    /// Parse `fwupdmgr get-updates --json`.
    ///
    /// Both `Devices`/`devices` casings are walked; a device needs a name
    /// (or `guid` fallback) and a first-release version to count. The
    /// current version comes from `CurrentVersion` or `version`.
    fn parse_get_updates_json(output: &str) -> Vec<PackageInfo> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(output) else {
            return Vec::new();
        };
        let Some(devices) = value
            .get("Devices")
            .or_else(|| value.get("devices"))
            .and_then(|v| v.as_array())
        else {
            return Vec::new();
        };

        let mut packages = Vec::new();
        for device in devices {
            let name = string_field(device, &["Name", "name"])
                .or_else(|| string_field(device, &["Guid", "guid"]));
            let Some(name) = name else { continue };

            let releases = device
                .get("Releases")
                .or_else(|| device.get("releases"))
                .and_then(|v| v.as_array());
            let new_version = releases
                .and_then(|releases| releases.first())
                .and_then(|release| string_field(release, &["Version", "version"]));
            let Some(new_version) = new_version else {
                continue;
            };

            let current = string_field(device, &["CurrentVersion", "version", "Version"]);
            packages.push(PackageInfo {
                name: name.to_string(),
                current_version: current.map(ToString::to_string),
                new_version: Some(new_version.to_string()),
            });
        }
        packages
    }
}

impl Updater for FwupdmgrUpdater {
    fn name(&self) -> &'static str {
        "fwupdmgr"
    }

    fn display_name(&self) -> &'static str {
        "fwupdmgr (Linux Firmware)"
    }

    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult> {
        let result = ctx.run_unchecked("fwupdmgr", ["get-updates", "--json"])?;
        if !result.success {
            let combined = format!("{}\n{}", result.stdout, result.stderr);
            if is_no_updates_message(&combined) {
                return Ok(CheckResult::default());
            }
            anyhow::bail!(
                "fwupdmgr get-updates に失敗しました: {}",
                result.stderr.trim()
            );
        }

        let packages = Self::parse_get_updates_json(&result.stdout);
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
                message: Some("更新可能なファームウェアはありません".to_string()),
                ..UpdateOutcome::default()
            });
        }

        ctx.run("fwupdmgr", ["update", "-y"])?;

        Ok(UpdateOutcome {
            updated_count: check.available_updates,
            packages: check.packages,
            errors: Vec::new(),
            message: Some(format!(
                "{} 件のファームウェアを更新しました",
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
        FwupdmgrUpdater::parse_get_updates_json(input)
    }

    #[test]
    fn identity_and_labels() {
        let updater = FwupdmgrUpdater;
        assert_eq!(updater.name(), "fwupdmgr");
        assert_eq!(updater.display_name(), "fwupdmgr (Linux Firmware)");
    }

    #[test]
    fn empty_output() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn invalid_json() {
        assert!(parse("{invalid").is_empty());
    }

    #[test]
    fn missing_devices_key() {
        assert!(parse(r#"{"status":"ok"}"#).is_empty());
    }

    #[test]
    fn pascal_case_device() {
        let input = r#"{
  "Devices": [
    {
      "Name": "USB-C Dock",
      "CurrentVersion": "1.0.0",
      "Releases": [
        {"Version": "1.1.0"}
      ]
    }
  ]
}"#;
        assert_eq!(
            parse(input),
            vec![PackageInfo::upgrade("USB-C Dock", "1.0.0", "1.1.0")]
        );
    }

    #[test]
    fn invalid_devices_are_skipped() {
        let input = r#"{
  "devices": [
    {"name":"NoRelease", "releases":[]},
    {"releases":[{"version":"2.0.0"}]},
    {"name":"NoVersion", "releases":[{}]}
  ]
}"#;
        assert!(parse(input).is_empty());
    }

    #[test]
    fn guid_fallback_for_missing_name() {
        let input = r#"{
  "devices": [
    {
      "guid": "abcd-efgh",
      "version": "1.0",
      "releases": [{"version":"1.1"}]
    }
  ]
}"#;
        assert_eq!(parse(input), vec![PackageInfo::upgrade("abcd-efgh", "1.0", "1.1")]);
    }

    // -----------------------------------------------------------------------
    // is_no_updates_message
    // -----------------------------------------------------------------------

    #[test]
    fn no_update_notices_are_not_errors() {
        assert!(is_no_updates_message("No updatable devices"));
        assert!(is_no_updates_message("There are no updates available"));
        assert!(is_no_updates_message("No upgrades for device"));
        assert!(!is_no_updates_message("device update failed"));
    }

    #[test]
    fn check_treats_no_updates_stderr_as_zero() {
        use crate::cancel::CancelToken;
        use crate::exec::Executor;
        use crate::exec::test_helpers::{MockExecutor, MockResponse};
        use std::sync::Arc;

        let mock = Arc::new(MockExecutor::with_responses(vec![MockResponse::fail(
            "No updatable devices\n",
        )]));
        let ctx = UpdaterContext::new(
            Arc::clone(&mock) as Arc<dyn Executor>,
            CancelToken::new(),
            None,
        );

        let check = FwupdmgrUpdater.check(&ctx).unwrap();
        assert_eq!(check.available_updates, 0);
    }

    #[test]
    fn check_surfaces_real_failures() {
        use crate::cancel::CancelToken;
        use crate::exec::Executor;
        use crate::exec::test_helpers::{MockExecutor, MockResponse};
        use std::sync::Arc;

        let mock = Arc::new(MockExecutor::with_responses(vec![MockResponse::fail(
            "failed to connect to fwupd daemon\n",
        )]));
        let ctx = UpdaterContext::new(
            Arc::clone(&mock) as Arc<dyn Executor>,
            CancelToken::new(),
            None,
        );

        let err = FwupdmgrUpdater.check(&ctx).unwrap_err();
        assert!(err.to_string().contains("fwupdmgr get-updates に失敗しました"));
    }
}
