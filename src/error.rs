//! Typed errors for the seams where callers must distinguish failure kinds.
//!
//! Most command handlers work with [`anyhow::Result`] and `?`; the process
//! runner returns [`ExecError`] so that callers can match on the failure
//! kind (missing binary, non-zero exit, cancellation, timeout) while the
//! Display output still carries the trimmed stderr as diagnostic context.
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the process runner.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program does not exist on `PATH`.
    #[error("コマンド '{program}' が見つかりません")]
    NotFound {
        /// Program name that could not be resolved.
        program: String,
    },

    /// The child process could not be spawned or waited on.
    #[error("{program} の起動に失敗しました: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The child exited with a non-zero status.
    ///
    /// Carries the trimmed stderr so the message is useful on its own, and
    /// the exit code so callers can branch without string matching.
    #[error("{program} failed (exit {code}): {stderr}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit code (`-1` when the process was killed by a signal).
        code: i32,
        /// Trimmed stderr captured from the child.
        stderr: String,
    },

    /// The child was killed because the run was cancelled.
    #[error("{program} を中断しました: {reason}")]
    Cancelled {
        /// Program name.
        program: String,
        /// Cancellation reason from the token.
        reason: String,
    },

    /// The child exceeded its allotted time and was killed.
    #[error("{program} がタイムアウトしました ({timeout:?})")]
    TimedOut {
        /// Program name.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl ExecError {
    /// The exit code of a [`ExecError::Failed`] value, if that is what this is.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
