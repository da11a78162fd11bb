//! Bounded-concurrency job runner with a typed event stream.
//!
//! Jobs are heterogeneous closures (repository operations, package-manager
//! invocations). The runner owns their execution and cancellation; the
//! renderer only observes the event stream.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use crossbeam_channel::Sender;

use crate::cancel::CancelToken;
use crate::error::ExecError;

/// An opaque unit of work scheduled by the runner.
///
/// The lifetime allows jobs to borrow caller-owned state (configuration,
/// the adapter registry); the runner only uses scoped threads, so borrows
/// stay sound.
pub struct Job<'a> {
    /// Display name carried into every event.
    pub name: String,
    work: Box<dyn FnOnce() -> Result<()> + Send + 'a>,
}

impl<'a> Job<'a> {
    /// Wrap a closure as a job.
    #[must_use]
    pub fn new(name: impl Into<String>, work: impl FnOnce() -> Result<()> + Send + 'a) -> Self {
        Self {
            name: name.into(),
            work: Box::new(work),
        }
    }
}

impl std::fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The job ran and returned `Ok`.
    Success,
    /// The job ran and returned an error.
    Failed,
    /// The job was precluded or interrupted by cancellation.
    Skipped,
}

/// Lifecycle events emitted by the runner.
///
/// Every attempted job emits exactly one `Started` then one `Finished`;
/// a job precluded by cancellation emits a single `Finished` with
/// [`JobStatus::Skipped`].
#[derive(Debug, Clone)]
pub enum Event {
    /// A job began executing.
    Started {
        /// Stable index, assignment order within the run.
        index: usize,
        /// Job display name.
        name: String,
        /// Wall-clock start time.
        at: SystemTime,
    },
    /// A job reached a terminal status.
    Finished {
        /// Stable index, assignment order within the run.
        index: usize,
        /// Job display name.
        name: String,
        /// Terminal status.
        status: JobStatus,
        /// Error detail for non-success statuses.
        error: Option<String>,
        /// Elapsed execution time (zero for never-started jobs).
        duration: Duration,
        /// Wall-clock finish time.
        at: SystemTime,
    },
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs that returned `Ok`.
    pub succeeded: usize,
    /// Jobs that returned an error.
    pub failed: usize,
    /// Jobs skipped by cancellation.
    pub skipped: usize,
}

impl RunSummary {
    /// Total number of jobs reported.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Whether an error chain stems from cancellation (token or killed child).
#[must_use]
pub fn is_cancellation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ExecError>(),
            Some(ExecError::Cancelled { .. })
        ) || cause.to_string().starts_with("キャンセルされました")
    })
}

/// Execute `jobs` with at most `concurrency` running simultaneously.
///
/// Jobs are dispatched in index order through a FIFO queue; `Finished`
/// events may interleave arbitrarily across workers. A failing job never
/// cancels its peers; only `cancel` does. The event sender is dropped
/// (closing the stream) exactly once, after every job has reported.
pub fn run(
    jobs: Vec<Job<'_>>,
    concurrency: usize,
    cancel: &CancelToken,
    events: Sender<Event>,
) -> RunSummary {
    let workers = concurrency.max(1);
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, Job<'_>)>();
    for entry in jobs.into_iter().enumerate() {
        job_tx.send(entry).ok();
    }
    drop(job_tx);

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let events = events.clone();
            let succeeded = &succeeded;
            let failed = &failed;
            let skipped = &skipped;
            scope.spawn(move || {
                while let Ok((index, job)) = job_rx.recv() {
                    let status = run_one(index, job, cancel, &events);
                    let counter = match status {
                        JobStatus::Success => succeeded,
                        JobStatus::Failed => failed,
                        JobStatus::Skipped => skipped,
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });
    drop(events);

    RunSummary {
        succeeded: succeeded.into_inner(),
        failed: failed.into_inner(),
        skipped: skipped.into_inner(),
    }
}

fn run_one(index: usize, job: Job<'_>, cancel: &CancelToken, events: &Sender<Event>) -> JobStatus {
    if cancel.is_cancelled() {
        events
            .send(Event::Finished {
                index,
                name: job.name,
                status: JobStatus::Skipped,
                error: Some(format!("{:#}", cancel.cancellation_error())),
                duration: Duration::ZERO,
                at: SystemTime::now(),
            })
            .ok();
        return JobStatus::Skipped;
    }

    events
        .send(Event::Started {
            index,
            name: job.name.clone(),
            at: SystemTime::now(),
        })
        .ok();

    let started = Instant::now();
    let result = (job.work)();
    let duration = started.elapsed();

    let (status, error) = match result {
        Ok(()) => (JobStatus::Success, None),
        Err(error) if is_cancellation(&error) => (JobStatus::Skipped, Some(format!("{error:#}"))),
        Err(error) => (JobStatus::Failed, Some(format!("{error:#}"))),
    };

    events
        .send(Event::Finished {
            index,
            name: job.name,
            status,
            error,
            duration,
            at: SystemTime::now(),
        })
        .ok();
    status
}
