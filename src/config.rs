//! The resolved configuration record consumed by every command.
//!
//! Loaded from `~/.config/devsync/config.toml` (honouring
//! `XDG_CONFIG_HOME`); a missing file yields [`Config::default`]. Unknown
//! keys are ignored so that older binaries tolerate newer files.
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::platform;

/// Default per-run timeout when `control.timeout` is absent or malformed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default worker-pool size.
pub const DEFAULT_CONCURRENCY: i64 = 8;

/// Free-form per-manager options (`[sys.managers.flatpak] use_user = true`).
pub type ManagerConfig = BTreeMap<String, toml::Value>;

/// Top-level configuration record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Run-control options (pool size, timeout).
    pub control: ControlConfig,
    /// Repository maintenance options.
    pub repo: RepoConfig,
    /// Package-manager dispatch options.
    pub sys: SysConfig,
    /// Credential-store items.
    pub secret: SecretConfig,
}

/// Run-control options shared by every command.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Worker-pool size for the job runner.
    pub concurrency: i64,
    /// Per-run timeout in `humantime` syntax (e.g. `"10m"`).
    pub timeout: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: "10m".to_string(),
        }
    }
}

/// Repository maintenance options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Root directory scanned for working copies (`~` expands to home).
    pub root: String,
    /// GitHub owner and clone-protocol preferences.
    pub github: GitHubConfig,
    /// Options applied to every update job.
    pub update: UpdatePolicy,
    /// Options applied to every cleanup job.
    pub cleanup: CleanupPolicy,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root: "~/src".to_string(),
            github: GitHubConfig::default(),
            update: UpdatePolicy::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

/// GitHub owner and clone-protocol preferences.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository owner used by the clone bootstrap; empty disables it.
    pub owner: String,
    /// Preferred clone protocol: `https` or `ssh`.
    pub protocol: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            protocol: "https".to_string(),
        }
    }
}

/// Options applied to every `repo update` job.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdatePolicy {
    /// Pass `--prune` to fetch.
    pub prune: bool,
    /// Pass `--autostash` to pull.
    pub auto_stash: bool,
    /// Run `submodule update` after pulling.
    pub submodule_update: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            prune: true,
            auto_stash: true,
            submodule_update: false,
        }
    }
}

/// Options applied to every `repo cleanup` job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Cleanup targets: subset of `merged`, `squashed`. Empty disables
    /// cleanup entirely.
    pub targets: Vec<String>,
    /// Local branches never deleted, in addition to the default and current
    /// branch.
    pub exclude_branches: Vec<String>,
}

/// Package-manager dispatch configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SysConfig {
    /// Enabled manager names, dispatched in declaration order.
    pub enable: Vec<String>,
    /// Per-manager options, keyed by manager name.
    pub managers: BTreeMap<String, ManagerConfig>,
}

/// Credential-store items to inject.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretConfig {
    /// Vault item ids fetched by `env export` / the daily run.
    pub items: Vec<String>,
}

impl Config {
    /// Load the configuration file, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load from an explicit path (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("設定ファイルを読み込めません: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("設定ファイルの解析に失敗: {}", path.display()))?;
        Ok(config)
    }

    /// The per-run timeout, defaulting when the string does not parse.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        humantime::parse_duration(self.control.timeout.trim()).unwrap_or(DEFAULT_TIMEOUT)
    }

    /// The repository root with `~` expanded and the path cleaned.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured root is blank or the home
    /// directory cannot be resolved for `~` expansion.
    pub fn repo_root(&self) -> Result<PathBuf> {
        normalize_repo_root(&self.repo.root)
    }
}

/// Path of the configuration file, honouring `XDG_CONFIG_HOME`.
///
/// # Errors
///
/// Returns an error when the home directory cannot be resolved.
pub fn config_path() -> Result<PathBuf> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => platform::home_dir()?.join(".config"),
    };
    Ok(base.join("devsync").join("config.toml"))
}

/// Expand `~` and lexically clean a repository root path.
///
/// # Errors
///
/// Returns an error when the input is blank or home resolution fails.
pub fn normalize_repo_root(input: &str) -> Result<PathBuf> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("repo.root が空です");
    }

    let expanded = if trimmed == "~" {
        platform::home_dir()?
    } else if let Some(rest) = trimmed.strip_prefix("~/") {
        platform::home_dir()?.join(rest)
    } else {
        PathBuf::from(trimmed)
    };

    Ok(clean_path(&dunce::simplified(&expanded).to_path_buf()))
}

/// Lexically resolve `.` and `..` components without touching the
/// filesystem, mirroring `filepath.Clean`.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(Component::ParentDir);
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Resolve the worker-pool size: a positive `--jobs` flag wins, then a
/// positive configured value, then 1.
#[must_use]
pub fn resolve_jobs(config_jobs: i64, flag_jobs: i64) -> usize {
    if flag_jobs > 0 {
        return usize::try_from(flag_jobs).unwrap_or(1);
    }
    if config_jobs > 0 {
        return usize::try_from(config_jobs).unwrap_or(1);
    }
    1
}

/// Resolve the submodule-update setting against the CLI overrides.
///
/// # Errors
///
/// Returns an error when both overrides are requested at once.
pub fn resolve_submodule_update(
    config_value: bool,
    enable_override: bool,
    disable_override: bool,
) -> Result<bool> {
    if enable_override && disable_override {
        anyhow::bail!("submodule update の有効化と無効化を同時に指定できません");
    }
    if enable_override {
        return Ok(true);
    }
    if disable_override {
        return Ok(false);
    }
    Ok(config_value)
}
