//! Process runner: cancellable execution of external commands.
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::error::ExecError;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A fully described command invocation.
///
/// Built fluently and handed to an [`Executor`]. Cancellation and timeout
/// are part of the request so that every call site gets child termination
/// for free instead of re-implementing it.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    /// Program name, resolved via `PATH`.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory for the child, if any.
    pub dir: Option<PathBuf>,
    /// Extra environment variables layered over the parent environment.
    pub env: Vec<(String, String)>,
    /// Kill the child when this much wall-clock time elapses.
    pub timeout: Option<Duration>,
    /// Kill the child when this token is cancelled.
    pub cancel: Option<CancelToken>,
}

impl ExecRequest {
    /// Start building a request for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Layer an environment variable over the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the execution timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Standard output as UTF-8 string.
    pub stdout: String,
    /// Standard error as UTF-8 string.
    pub stderr: String,
    /// Whether the command exited successfully (status code 0).
    pub success: bool,
    /// Exit code if available, or None if terminated by signal.
    pub code: Option<i32>,
}

/// Trait for executing system commands, enabling test injection.
///
/// The [`SystemExecutor`] implementation spawns real processes; tests use
/// the scripted mock from [`test_helpers`].
pub trait Executor: std::fmt::Debug + Send + Sync {
    /// Execute a command, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Failed`] (carrying the exit code and trimmed
    /// stderr) on non-zero exit, or the spawn/cancel/timeout variants.
    fn run(&self, req: &ExecRequest) -> Result<ExecResult>;

    /// Execute a command, allowing non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error only when the command could not be executed at all,
    /// was cancelled, or timed out — a non-zero exit is captured in the
    /// result instead.
    fn run_unchecked(&self, req: &ExecRequest) -> Result<ExecResult>;

    /// Check if a program is available on PATH.
    fn which(&self, program: &str) -> bool;
}

/// The real system executor.
#[derive(Debug)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, req: &ExecRequest) -> Result<ExecResult> {
        let result = execute(req)?;
        if result.success {
            return Ok(result);
        }
        Err(ExecError::Failed {
            program: req.program.clone(),
            code: result.code.unwrap_or(-1),
            stderr: result.stderr.trim().to_string(),
        }
        .into())
    }

    fn run_unchecked(&self, req: &ExecRequest) -> Result<ExecResult> {
        Ok(execute(req)?)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Spawn the child with piped stdio and wait, polling for cancellation.
///
/// Both output pipes are drained on helper threads so a chatty child cannot
/// deadlock against a full pipe buffer while we poll `try_wait`.
fn execute(req: &ExecRequest) -> Result<ExecResult, ExecError> {
    let mut cmd = Command::new(&req.program);
    cmd.args(&req.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &req.dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &req.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExecError::NotFound {
                program: req.program.clone(),
            }
        } else {
            ExecError::Spawn {
                program: req.program.clone(),
                source,
            }
        }
    })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || drain(stdout_pipe));
    let stderr_reader = std::thread::spawn(move || drain(stderr_pipe));

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                child.kill().ok();
                return Err(ExecError::Spawn {
                    program: req.program.clone(),
                    source,
                });
            }
        }

        if let Some(token) = &req.cancel
            && token.is_cancelled()
        {
            child.kill().ok();
            child.wait().ok();
            return Err(ExecError::Cancelled {
                program: req.program.clone(),
                reason: token.reason().unwrap_or_else(|| "cancelled".to_string()),
            });
        }

        if let Some(timeout) = req.timeout
            && started.elapsed() >= timeout
        {
            child.kill().ok();
            child.wait().ok();
            return Err(ExecError::TimedOut {
                program: req.program.clone(),
                timeout,
            });
        }

        std::thread::sleep(WAIT_POLL_INTERVAL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(ExecResult {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        success: status.success(),
        code: status.code(),
    })
}

fn drain(pipe: Option<impl std::io::Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).ok();
    }
    buf
}
