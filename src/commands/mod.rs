//! Command handlers: one module per sub-command family.
pub mod completion;
pub mod daily;
pub mod env;
pub mod repo;
pub mod shell;
pub mod sys;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::{Cli, Command, EnvCommand, GlobalOpts, RepoCommand, SysCommand};
use crate::config::{Config, resolve_jobs};
use crate::exec::{Executor, SystemExecutor};
use crate::progress::ProgressModel;
use crate::runner::{Job, RunSummary};

/// Everything a command handler needs, resolved once per invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded configuration (with CLI overrides applied).
    pub config: Config,
    /// Process runner shared by every job.
    pub executor: Arc<dyn Executor>,
    /// Run-wide cancellation token.
    pub cancel: CancelToken,
    /// Preview mode.
    pub dry_run: bool,
    /// Worker-pool size.
    pub jobs: usize,
    /// Per-run timeout.
    pub timeout: Duration,
}

impl CommandContext {
    /// Build the context from the global flags, arming the run timeout.
    ///
    /// # Errors
    ///
    /// Fails when the configuration file exists but cannot be parsed.
    pub fn build(global: &GlobalOpts, cancel: &CancelToken) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(root) = &global.root {
            config.repo.root = root.display().to_string();
        }

        let jobs = resolve_jobs(config.control.concurrency, global.jobs);
        let timeout = config.timeout();
        cancel.arm_timeout(timeout);

        Ok(Self {
            config,
            executor: Arc::new(SystemExecutor),
            cancel: cancel.clone(),
            dry_run: global.dry_run,
            jobs,
            timeout,
        })
    }
}

/// Route a parsed invocation to its handler.
///
/// The first three arms are pure output and never touch the
/// configuration; the rest build a [`CommandContext`] first.
///
/// # Errors
///
/// Propagates the handler's error; `main` renders it and exits non-zero.
#[allow(clippy::print_stdout)]
pub fn dispatch(args: Cli, cancel: &CancelToken) -> Result<()> {
    match args.command {
        Command::Version => {
            let version = option_env!("DEVSYNC_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("devsync {version}");
            Ok(())
        }
        Command::Completion(opts) => {
            completion::run(&opts);
            Ok(())
        }
        Command::ShellInit(opts) => {
            shell::run(&opts);
            Ok(())
        }
        Command::Run => daily::run(&CommandContext::build(&args.global, cancel)?),
        Command::Repo { command } => {
            let ctx = CommandContext::build(&args.global, cancel)?;
            match command {
                RepoCommand::List => repo::list(&ctx),
                RepoCommand::Update(opts) => repo::update(&ctx, &opts),
                RepoCommand::Cleanup => repo::cleanup(&ctx),
            }
        }
        Command::Sys { command } => {
            let ctx = CommandContext::build(&args.global, cancel)?;
            match command {
                SysCommand::Check => sys::check(&ctx),
                SysCommand::Update => sys::update(&ctx),
            }
        }
        Command::Env { command } => {
            let ctx = CommandContext::build(&args.global, cancel)?;
            match command {
                EnvCommand::Export => env::export(&ctx),
                EnvCommand::Run(opts) => env::run(&ctx, &opts),
            }
        }
    }
}

/// Run a job list through the runner while the progress view consumes the
/// event stream on this thread.
pub(crate) fn run_with_progress(
    title: &str,
    jobs: Vec<Job<'_>>,
    concurrency: usize,
    cancel: &CancelToken,
) -> RunSummary {
    let names: Vec<String> = jobs.iter().map(|job| job.name.clone()).collect();
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut model = ProgressModel::new(title, &names);

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| crate::runner::run(jobs, concurrency, cancel, tx));
        crate::progress::consume_events(&rx, &mut model);
        handle.join().unwrap_or_default()
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn run_with_progress_reports_summary() {
        let cancel = CancelToken::new();
        let jobs = vec![
            Job::new("ok", || Ok(())),
            Job::new("bad", || anyhow::bail!("nope")),
        ];
        let summary = run_with_progress("test", jobs, 2, &cancel);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}
