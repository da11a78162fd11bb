//! Secret injection from the Bitwarden CLI vault.
//!
//! Items carry their destination variable in the notes field as
//! `env:VAR_NAME`; the login password becomes the value. Loading is
//! best-effort per item so a misconfigured entry never blocks the daily
//! run.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::LazyLock;

use anyhow::{Context as _, Result};
use regex::Regex;
use serde::Deserialize;

use crate::exec::{ExecRequest, Executor};
use crate::platform::normalize_env_key;

/// Environment variable holding the unlocked vault session token.
pub const SESSION_ENV: &str = "BW_SESSION";

static ENV_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"env:([A-Z0-9_]+)").unwrap_or_else(|_| unreachable!()));

/// One vault item, as returned by `bw get item <id> --raw`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultItem {
    /// Item id.
    #[serde(default)]
    pub id: String,
    /// Item display name.
    #[serde(default)]
    pub name: String,
    /// Free-form notes; scanned for `env:VAR_NAME`.
    #[serde(default)]
    pub notes: String,
    /// Login credentials.
    #[serde(default)]
    pub login: VaultLogin,
}

/// Login sub-record of a vault item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultLogin {
    /// Username, unused by the injector but kept for display.
    #[serde(default)]
    pub username: String,
    /// Password, injected as the variable value.
    #[serde(default)]
    pub password: String,
}

/// Counters for one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Items that produced an environment variable.
    pub loaded: usize,
    /// Items skipped (missing destination or empty password).
    pub skipped: usize,
}

/// Vault access over an injected executor.
#[derive(Debug)]
pub struct Injector {
    executor: Arc<dyn Executor>,
    items: Vec<String>,
}

impl Injector {
    /// Create an injector for the configured item ids.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, items: Vec<String>) -> Self {
        Self { executor, items }
    }

    /// Unlock the vault and return the raw session token.
    ///
    /// The caller exports it as `BW_SESSION` (process-wide, before workers
    /// start).
    ///
    /// # Errors
    ///
    /// Fails when `bw` is missing or the unlock command fails.
    pub fn unlock(&self) -> Result<String> {
        self.ensure_bw()?;
        let result = self
            .executor
            .run(&ExecRequest::new("bw").args(["unlock", "--raw"]))
            .context("vault のアンロックに失敗しました")?;
        let token = result.stdout.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("bw unlock がセッショントークンを返しませんでした");
        }
        Ok(token)
    }

    /// Fetch every configured item and collect the destination variables.
    ///
    /// Items without an `env:NAME` note or with an empty password are
    /// logged and skipped, not fatal.
    ///
    /// # Errors
    ///
    /// Fails when `bw` is missing, the session is absent, or an item
    /// cannot be fetched or parsed.
    pub fn load_env(&self) -> Result<(BTreeMap<String, String>, LoadStats)> {
        let mut vars = BTreeMap::new();
        let mut stats = LoadStats::default();
        if self.items.is_empty() {
            return Ok((vars, stats));
        }

        self.ensure_bw()?;
        if std::env::var(SESSION_ENV).map_or(true, |session| session.trim().is_empty()) {
            anyhow::bail!("BW_SESSION が設定されていません。`bw unlock` を実行してください");
        }

        for item_id in &self.items {
            let item = self
                .get_item(item_id)
                .with_context(|| format!("item '{item_id}' の取得失敗"))?;

            let Some(env_name) = extract_env_name(&item.notes) else {
                tracing::warn!(
                    item = %item_id,
                    name = %item.name,
                    "メモに 'env:NAME' の指定が見つからないためスキップします"
                );
                stats.skipped += 1;
                continue;
            };

            if item.login.password.is_empty() {
                tracing::warn!(
                    item = %item_id,
                    name = %item.name,
                    "パスワードが空のためスキップします"
                );
                stats.skipped += 1;
                continue;
            }

            vars.insert(env_name, item.login.password);
            stats.loaded += 1;
        }

        Ok((vars, stats))
    }

    fn get_item(&self, id: &str) -> Result<VaultItem> {
        let result = self
            .executor
            .run(&ExecRequest::new("bw").args(["get", "item", id, "--raw"]))?;
        serde_json::from_str(&result.stdout).context("vault アイテムの解析に失敗")
    }

    fn ensure_bw(&self) -> Result<()> {
        if self.executor.which("bw") {
            return Ok(());
        }
        anyhow::bail!("bw コマンドが見つかりません。Bitwarden CLI をインストールしてください")
    }
}

/// Destination variable name from an item's notes (`env:VAR_NAME`).
#[must_use]
pub fn extract_env_name(notes: &str) -> Option<String> {
    ENV_NAME_PATTERN
        .captures(notes)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Merge `overrides` into `base` (`KEY=VALUE` pairs).
///
/// Every override key appears exactly once in the result; base entries with
/// an equivalent key (after platform normalisation: case-insensitive on
/// Windows) are dropped.
#[must_use]
pub fn merge_env(
    base: &[(String, String)],
    overrides: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    if overrides.is_empty() {
        return base.to_vec();
    }

    let override_keys: std::collections::BTreeSet<String> =
        overrides.keys().map(|key| normalize_env_key(key)).collect();

    let mut merged: Vec<(String, String)> = base
        .iter()
        .filter(|(key, _)| !override_keys.contains(&normalize_env_key(key)))
        .cloned()
        .collect();

    for (key, value) in overrides {
        merged.push((key.clone(), value.clone()));
    }

    merged
}

/// Spawn `args[0]` with the parent environment merged against `overrides`,
/// inheriting stdio. Returns the child's exit code.
///
/// # Errors
///
/// Fails when no command is given, the program cannot be found, or the
/// child cannot be spawned.
pub fn run_with_env(args: &[String], overrides: &BTreeMap<String, String>) -> Result<i32> {
    let Some((program, rest)) = args.split_first() else {
        anyhow::bail!("コマンドが指定されていません");
    };

    let resolved = which::which(program)
        .map_err(|error| anyhow::anyhow!("コマンド '{program}' が見つかりません: {error}"))?;

    let base: Vec<(String, String)> = std::env::vars().collect();
    let merged = merge_env(&base, overrides);

    let status = std::process::Command::new(resolved)
        .args(rest)
        .env_clear()
        .envs(merged)
        .status()
        .with_context(|| format!("コマンド '{program}' の実行に失敗しました"))?;

    Ok(status.code().unwrap_or(-1))
}

/// Render `export KEY='value'` lines for POSIX shell evaluation.
#[must_use]
pub fn render_export_lines(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        let quoted = value.replace('\'', r"'\''");
        out.push_str(&format!("export {key}='{quoted}'\n"));
    }
    out
}
