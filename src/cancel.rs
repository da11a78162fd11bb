//! Cooperative cancellation shared by every worker and child process.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;

const SLEEP_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A cheap, cloneable cancellation flag with an attached reason.
///
/// One token is created per invocation and handed to the job runner, the
/// process runner and the host-issuer retry loop. Cancelling it (Ctrl-C
/// handler or the per-run timeout watchdog) terminates running children and
/// skips queued jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. The first reason wins; later calls are no-ops.
    pub fn cancel(&self, reason: &str) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.inner.reason.lock() {
            *guard = Some(reason.to_string());
        }
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason given to the first [`cancel`](Self::cancel) call.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().ok().and_then(|guard| guard.clone())
    }

    /// An error describing the cancellation, for job results and events.
    #[must_use]
    pub fn cancellation_error(&self) -> anyhow::Error {
        match self.reason() {
            Some(reason) => anyhow!("キャンセルされました: {reason}"),
            None => anyhow!("キャンセルされました"),
        }
    }

    /// Sleep for `duration`, waking early when the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the cancellation error if the token trips during the sleep.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return Err(self.cancellation_error());
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_POLL_INTERVAL));
        }
    }

    /// Arm a watchdog that cancels this token after `timeout`.
    ///
    /// The watchdog runs on a detached thread; if the run finishes first the
    /// late cancellation is harmless.
    pub fn arm_timeout(&self, timeout: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            token.cancel(&format!(
                "実行時間の上限に達しました ({})",
                humantime::format_duration(timeout)
            ));
        });
    }
}
