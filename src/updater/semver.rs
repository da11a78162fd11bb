//! Three-part version extraction and comparison shared by adapters.
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

static SEMVER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+)").unwrap_or_else(|_| unreachable!()));

/// First `x.y.z` token in `text` (an optional `v` prefix is stripped).
#[must_use]
pub fn extract_semver(text: &str) -> Option<String> {
    SEMVER_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every `x.y.z` token in `text`.
#[must_use]
pub fn extract_all_semvers(text: &str) -> Vec<String> {
    SEMVER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strict `<` over well-formed three-part versions.
///
/// # Errors
///
/// Fails with "不正な semver 形式" on malformed input.
pub fn is_semver_less(left: &str, right: &str) -> Result<bool> {
    let left_parts = parse_semver(left)?;
    let right_parts = parse_semver(right)?;
    Ok(left_parts < right_parts)
}

/// Parse `[v]x.y.z` into its numeric parts.
///
/// # Errors
///
/// Fails with "不正な semver 形式" unless exactly three numeric parts are
/// present.
pub fn parse_semver(value: &str) -> Result<[u64; 3]> {
    let normalized = value.trim().trim_start_matches('v');
    let parts: Vec<&str> = normalized.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow!("不正な semver 形式: {value:?}"));
    }

    let mut result = [0u64; 3];
    for (slot, part) in result.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| anyhow!("不正な semver 要素: {value:?}"))?;
    }
    Ok(result)
}

/// The semver-maximum of `versions`, ignoring malformed entries.
#[must_use]
pub fn max_semver(versions: &[String]) -> Option<String> {
    let mut latest: Option<&String> = None;
    for version in versions {
        match latest {
            None => latest = Some(version),
            Some(current) => {
                if is_semver_less(current, version).unwrap_or(false) {
                    latest = Some(version);
                }
            }
        }
    }
    latest.cloned()
}
