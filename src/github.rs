//! GitHub host issuer: repository listing and merged-PR heads via the `gh`
//! CLI, with rate-limit-aware retry.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::cancel::CancelToken;
use crate::exec::{ExecRequest, ExecResult, Executor};

/// Pagination limit for `gh repo list` and `gh pr list`.
pub const GITHUB_LIST_LIMIT: usize = 1000;

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(5);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

static RETRY_AFTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Retry-After:\s*(\d+)").unwrap_or_else(|_| unreachable!()));
static HTTP_STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(429|5\d{2})\b").unwrap_or_else(|_| unreachable!()));

/// One repository as reported by `gh repo list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GithubRepo {
    /// Repository name (without the owner).
    #[serde(default)]
    pub name: String,
    /// HTTPS clone URL.
    #[serde(default)]
    pub url: String,
    /// SSH clone URL, possibly empty.
    #[serde(default, rename = "sshUrl")]
    pub ssh_url: String,
    /// Whether the repository is archived.
    #[serde(default, rename = "isArchived")]
    pub is_archived: bool,
}

#[derive(Debug, Deserialize)]
struct MergedPrEntry {
    #[serde(default, rename = "headRefName")]
    head_ref_name: String,
    #[serde(default, rename = "headRefOid")]
    head_ref_oid: String,
    #[serde(default, rename = "mergedAt")]
    merged_at: String,
}

/// Injectable sleep step so the retry policy can be exercised without real
/// delays.
pub trait Sleeper: std::fmt::Debug + Send + Sync {
    /// Sleep for `duration`, returning early with an error on cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error when the sleep was interrupted by cancellation.
    fn sleep(&self, duration: Duration) -> Result<()>;
}

/// Sleeper backed by the run's [`CancelToken`].
#[derive(Debug)]
pub struct TokenSleeper {
    token: CancelToken,
}

impl TokenSleeper {
    /// Wrap a token.
    #[must_use]
    pub fn new(token: &CancelToken) -> Self {
        Self {
            token: token.clone(),
        }
    }
}

impl Sleeper for TokenSleeper {
    fn sleep(&self, duration: Duration) -> Result<()> {
        self.token.sleep(duration)
    }
}

/// Whether a failed `gh` invocation should be retried.
///
/// Transient iff stderr reports an exhausted client-side retry together
/// with a rate-limit signal: status 429, a 5xx status, or the literal
/// "rate limit".
#[must_use]
pub fn is_transient_gh_error(stderr: &str) -> bool {
    if !stderr.contains("exceeded retry limit") {
        return false;
    }
    stderr.to_lowercase().contains("rate limit") || HTTP_STATUS_PATTERN.is_match(stderr)
}

/// Seconds advertised in a `Retry-After: N` substring, if present.
#[must_use]
pub fn parse_retry_after(stderr: &str) -> Option<u64> {
    RETRY_AFTER_PATTERN
        .captures(stderr)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Delay before the next attempt.
///
/// `Retry-After: N` wins with `N+1` seconds; otherwise a bounded
/// exponential backoff `min(5s · 2^(attempt-1), 60s)`.
#[must_use]
pub fn calc_retry_delay(attempt: u32, stderr: &str) -> Duration {
    if let Some(seconds) = parse_retry_after(stderr) {
        return Duration::from_secs(seconds + 1);
    }
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    (BACKOFF_BASE.saturating_mul(factor)).min(BACKOFF_CAP)
}

/// Client for the `gh` CLI with retry and injectable collaborators.
#[derive(Debug)]
pub struct GhClient {
    executor: Arc<dyn Executor>,
    sleeper: Arc<dyn Sleeper>,
    cancel: Option<CancelToken>,
}

impl GhClient {
    /// Build a client over the given executor and sleep step.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            executor,
            sleeper,
            cancel: None,
        }
    }

    /// Kill in-flight `gh` calls when `token` cancels.
    #[must_use]
    pub fn with_cancel(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// List repositories for `owner`.
    ///
    /// # Errors
    ///
    /// Fails when `gh` is missing, when every retry is exhausted, or when
    /// the JSON cannot be parsed.
    pub fn list_repos(&self, owner: &str) -> Result<Vec<GithubRepo>> {
        self.ensure_gh()?;
        let args = vec![
            "repo".to_string(),
            "list".to_string(),
            owner.to_string(),
            "--limit".to_string(),
            GITHUB_LIST_LIMIT.to_string(),
            "--json".to_string(),
            "name,url,sshUrl,isArchived".to_string(),
        ];
        let result = self
            .run_with_retry(None, &args)
            .context("gh repo list の実行に失敗しました")?;
        serde_json::from_str(&result.stdout).context("リポジトリ一覧の解析に失敗")
    }

    /// Map merged-PR head branch name → head commit id for PRs targeting
    /// `base_branch`, most recent merge winning on duplicates.
    ///
    /// # Errors
    ///
    /// Fails when `gh` is missing, when every retry is exhausted, or when
    /// the JSON cannot be parsed.
    pub fn list_merged_pr_heads(
        &self,
        repo_path: &Path,
        base_branch: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.ensure_gh()?;
        let args = vec![
            "pr".to_string(),
            "list".to_string(),
            "--state".to_string(),
            "merged".to_string(),
            "--base".to_string(),
            base_branch.to_string(),
            "--limit".to_string(),
            GITHUB_LIST_LIMIT.to_string(),
            "--json".to_string(),
            "headRefName,headRefOid,mergedAt".to_string(),
        ];
        let result = self
            .run_with_retry(Some(repo_path), &args)
            .context("gh pr list の実行に失敗しました")?;

        let entries: Vec<MergedPrEntry> =
            serde_json::from_str(&result.stdout).context("PR 一覧の解析に失敗")?;

        let mut heads: BTreeMap<String, String> = BTreeMap::new();
        // mergedAt is RFC 3339 in UTC, so lexical comparison orders by time.
        let mut merged_at: BTreeMap<String, String> = BTreeMap::new();
        for entry in entries {
            let name = entry.head_ref_name.trim().to_string();
            let oid = entry.head_ref_oid.trim().to_string();
            if name.is_empty() || oid.is_empty() {
                continue;
            }
            let newer = merged_at
                .get(&name)
                .is_none_or(|existing| entry.merged_at > *existing);
            if newer {
                merged_at.insert(name.clone(), entry.merged_at.clone());
                heads.insert(name, oid);
            }
        }
        Ok(heads)
    }

    fn ensure_gh(&self) -> Result<()> {
        if self.executor.which("gh") {
            return Ok(());
        }
        anyhow::bail!("gh コマンドが見つかりません。GitHub CLI をインストールしてください")
    }

    /// Run `gh` with the retry policy, returning the successful result.
    fn run_with_retry(&self, dir: Option<&Path>, args: &[String]) -> Result<ExecResult> {
        let mut attempt = 1u32;
        loop {
            let mut request = ExecRequest::new("gh").args(args.iter().cloned());
            if let Some(dir) = dir {
                request = request.dir(dir);
            }
            if let Some(token) = &self.cancel {
                request = request.cancel(token);
            }

            let result = self.executor.run_unchecked(&request)?;
            if result.success {
                return Ok(result);
            }

            if attempt >= MAX_ATTEMPTS || !is_transient_gh_error(&result.stderr) {
                anyhow::bail!("gh の実行に失敗しました: {}", result.stderr.trim());
            }

            let delay = calc_retry_delay(attempt, &result.stderr);
            tracing::warn!(attempt, ?delay, "gh がレート制限に達したため再試行します");
            self.sleeper.sleep(delay)?;
            attempt += 1;
        }
    }
}
