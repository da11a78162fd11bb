//! Package-manager adapters: one module per backing tool, a shared
//! capability contract, and the explicit registry the dispatcher walks.
pub mod apt;
pub mod brew;
pub mod cargo;
pub mod flatpak;
pub mod fwupdmgr;
pub mod gem;
pub mod npm;
pub mod nvm;
pub mod pipx;
pub mod pnpm;
pub mod rustup;
pub mod scoop;
pub mod semver;
pub mod snap;
pub mod table;
pub mod uv;
pub mod winget;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::config::ManagerConfig;
use crate::exec::{ExecRequest, ExecResult, Executor};

/// One package as reported by a backing tool.
///
/// `new_version` only ⇒ fresh install; both ⇒ upgrade; `current_version`
/// only ⇒ installed, freshness unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package name; never empty in parser output.
    pub name: String,
    /// Installed version, when known.
    pub current_version: Option<String>,
    /// Version an update would install, when known.
    pub new_version: Option<String>,
}

impl PackageInfo {
    /// A package with only the installed version known.
    #[must_use]
    pub fn installed(name: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_version: Some(current.into()),
            new_version: None,
        }
    }

    /// A package with both versions known.
    #[must_use]
    pub fn upgrade(
        name: impl Into<String>,
        current: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: Some(current.into()),
            new_version: Some(new.into()),
        }
    }

    /// A package that would be newly installed.
    #[must_use]
    pub fn install(name: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_version: None,
            new_version: Some(new.into()),
        }
    }
}

/// Result of a non-mutating check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// Number of available updates.
    pub available_updates: usize,
    /// The packages behind the count.
    pub packages: Vec<PackageInfo>,
    /// Optional human-readable note.
    pub message: Option<String>,
}

/// Result of a (possibly dry-run) update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Packages actually updated (0 in dry-run).
    pub updated_count: usize,
    /// Packages acted on (or that would be acted on).
    pub packages: Vec<PackageInfo>,
    /// Non-fatal per-package errors.
    pub errors: Vec<String>,
    /// Human-readable summary.
    pub message: Option<String>,
}

/// Options for [`Updater::update`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Record what would happen without invoking mutating subcommands.
    pub dry_run: bool,
}

/// Execution context shared by every adapter invocation.
#[derive(Debug, Clone)]
pub struct UpdaterContext {
    /// Process runner.
    pub executor: Arc<dyn Executor>,
    /// Run-wide cancellation token.
    pub cancel: CancelToken,
    /// Per-command timeout.
    pub timeout: Option<Duration>,
}

impl UpdaterContext {
    /// Build a context over an executor.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            executor,
            cancel,
            timeout,
        }
    }

    /// An [`ExecRequest`] pre-wired with this context's cancel and timeout.
    #[must_use]
    pub fn request<I, S>(&self, program: &str, args: I) -> ExecRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = ExecRequest::new(program).args(args).cancel(&self.cancel);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    /// Run a command, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Propagates process-runner errors (which carry trimmed stderr).
    pub fn run<I, S>(&self, program: &str, args: I) -> Result<ExecResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executor.run(&self.request(program, args))
    }

    /// Run a command, capturing a non-zero exit in the result.
    ///
    /// # Errors
    ///
    /// Fails only when the command could not run at all.
    pub fn run_unchecked<I, S>(&self, program: &str, args: I) -> Result<ExecResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executor.run_unchecked(&self.request(program, args))
    }

    /// Run a command and return its stdout.
    ///
    /// # Errors
    ///
    /// Propagates process-runner errors.
    pub fn run_output<I, S>(&self, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.run(program, args)?.stdout)
    }
}

/// Capability set every package-manager adapter satisfies.
pub trait Updater: Send + Sync {
    /// Stable identifier, matching the user-visible enablement key.
    fn name(&self) -> &'static str;

    /// Human-readable label.
    fn display_name(&self) -> &'static str;

    /// Whether the backing tool is installed and usable right now.
    fn is_available(&self, executor: &dyn Executor) -> bool {
        executor.which(self.name())
    }

    /// Accept per-manager options. Unknown keys and type-mismatched values
    /// are ignored, never errors.
    fn configure(&mut self, _options: &ManagerConfig) {}

    /// Non-mutating query for available updates.
    ///
    /// # Errors
    ///
    /// Fails when the backing tool cannot be queried or its output is
    /// unusable where the tool contract requires strictness.
    fn check(&self, ctx: &UpdaterContext) -> Result<CheckResult>;

    /// Apply updates. Under dry-run no mutating subcommand may run; the
    /// outcome carries the same package set as [`Updater::check`] with a
    /// dry-run-indicative message.
    ///
    /// # Errors
    ///
    /// Fails when the backing tool reports a failure.
    fn update(&self, ctx: &UpdaterContext, opts: &UpdateOptions) -> Result<UpdateOutcome>;
}

/// Read a boolean option, ignoring missing keys and type mismatches.
#[must_use]
pub fn config_bool(options: &ManagerConfig, key: &str) -> Option<bool> {
    match options.get(key) {
        Some(toml::Value::Boolean(value)) => Some(*value),
        _ => None,
    }
}

/// The dry-run message shared by adapters that defer to their check.
#[must_use]
pub fn dry_run_message(count: usize) -> String {
    format!("{count} 件の更新が可能です（DryRunモード）")
}

/// Build an [`UpdateOutcome`] for a dry-run from a check result.
#[must_use]
pub fn dry_run_outcome(check: CheckResult) -> UpdateOutcome {
    UpdateOutcome {
        updated_count: 0,
        message: Some(dry_run_message(check.available_updates)),
        packages: check.packages,
        errors: Vec::new(),
    }
}

/// Explicit adapter registry, populated once at process start.
pub struct Registry {
    updaters: Vec<Box<dyn Updater>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("updaters", &self.names())
            .finish()
    }
}

impl Registry {
    /// Every built-in adapter.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            updaters: vec![
                Box::new(apt::AptUpdater::default()),
                Box::new(brew::BrewUpdater::default()),
                Box::new(npm::NpmUpdater::default()),
                Box::new(pnpm::PnpmUpdater::default()),
                Box::new(pipx::PipxUpdater::default()),
                Box::new(uv::UvUpdater::default()),
                Box::new(cargo::CargoUpdater::default()),
                Box::new(gem::GemUpdater::default()),
                Box::new(rustup::RustupUpdater::default()),
                Box::new(nvm::NvmUpdater::default()),
                Box::new(flatpak::FlatpakUpdater::default()),
                Box::new(snap::SnapUpdater::default()),
                Box::new(fwupdmgr::FwupdmgrUpdater::default()),
                Box::new(scoop::ScoopUpdater::default()),
                Box::new(winget::WingetUpdater::default()),
            ],
        }
    }

    /// Apply per-manager options to the matching adapters.
    pub fn configure(&mut self, managers: &std::collections::BTreeMap<String, ManagerConfig>) {
        for updater in &mut self.updaters {
            if let Some(options) = managers.get(updater.name()) {
                updater.configure(options);
            }
        }
    }

    /// Look up one adapter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Updater> {
        self.updaters
            .iter()
            .find(|updater| updater.name() == name)
            .map(|updater| &**updater)
    }

    /// All registered names, registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.updaters.iter().map(|updater| updater.name()).collect()
    }

    /// Resolve the enabled list in user-declared order, returning the
    /// adapters plus the names that matched nothing.
    #[must_use]
    pub fn enabled(&self, enable: &[String]) -> (Vec<&dyn Updater>, Vec<String>) {
        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for name in enable {
            match self.get(name.trim()) {
                Some(updater) => selected.push(updater),
                None => unknown.push(name.clone()),
            }
        }
        (selected, unknown)
    }
}
