//! End-to-end runner + progress-view behaviour through the public API.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use devsync_cli::cancel::CancelToken;
use devsync_cli::progress::{JobState, ProgressModel};
use devsync_cli::runner::{Event, Job, JobStatus, run};

fn job_names(jobs: &[Job<'_>]) -> Vec<String> {
    jobs.iter().map(|job| job.name.clone()).collect()
}

#[test]
fn success_failure_and_cancellation_render_the_expected_log_lines() {
    let cancel = CancelToken::new();
    let trip = cancel.clone();
    let jobs = vec![
        Job::new("J0", || Ok(())),
        Job::new("J1", move || {
            trip.cancel("stop");
            anyhow::bail!("boom")
        }),
        Job::new("J2", || Ok(())),
    ];
    let names = job_names(&jobs);

    let (tx, rx) = crossbeam_channel::unbounded();
    let summary = run(jobs, 1, &cancel, tx);

    let mut model = ProgressModel::new("daily", &names);
    for event in rx.iter() {
        model.apply(&event);
    }

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);

    let logs = model.logs().join("\n");
    assert!(logs.contains("完了: J0"), "logs: {logs}");
    assert!(logs.contains("失敗: J1"), "logs: {logs}");
    assert!(logs.contains("スキップ: J2"), "logs: {logs}");

    assert_eq!(model.jobs()[0].state, JobState::Success);
    assert_eq!(model.jobs()[1].state, JobState::Failed);
    assert!(model.jobs()[1].error.contains("boom"));
    assert_eq!(model.jobs()[2].state, JobState::Skipped);
    assert!(model.jobs()[2].error.contains("stop"));
}

#[test]
fn events_pair_started_and_finished_per_job() {
    let cancel = CancelToken::new();
    let jobs: Vec<Job<'_>> = (0..12)
        .map(|i| Job::new(format!("job-{i}"), move || {
            if i % 3 == 0 {
                anyhow::bail!("planned failure")
            }
            Ok(())
        }))
        .collect();

    let (tx, rx) = crossbeam_channel::unbounded();
    let summary = run(jobs, 4, &cancel, tx);
    let events: Vec<Event> = rx.into_iter().collect();

    assert_eq!(summary.succeeded + summary.failed, 12);

    for index in 0..12usize {
        let started = events
            .iter()
            .filter(|event| matches!(event, Event::Started { index: i, .. } if *i == index))
            .count();
        let finished = events
            .iter()
            .filter(|event| matches!(event, Event::Finished { index: i, .. } if *i == index))
            .count();
        assert_eq!(started, 1, "job {index} started events");
        assert_eq!(finished, 1, "job {index} finished events");
    }
}

#[test]
fn jobs_can_borrow_caller_state() {
    // The lifetime parameter on Job allows borrowing a counter owned by
    // this frame; the runner only uses scoped threads.
    let cancel = CancelToken::new();
    let counter = AtomicUsize::new(0);
    let counter_ref = &counter;

    let jobs: Vec<Job<'_>> = (0..5)
        .map(|i| {
            Job::new(format!("count-{i}"), move || {
                counter_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    let (tx, rx) = crossbeam_channel::unbounded();
    let summary = run(jobs, 2, &cancel, tx);
    drop(rx);

    assert_eq!(summary.succeeded, 5);
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn shared_pool_mixes_heterogeneous_jobs() {
    // Repository-style and adapter-style jobs share one pool, as in the
    // daily run.
    let cancel = CancelToken::new();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut jobs = Vec::new();
    for name in ["repo: devsync", "repo: dotfiles"] {
        let log = Arc::clone(&log);
        jobs.push(Job::new(name, move || {
            log.lock().map_or((), |mut entries| entries.push("repo"));
            Ok(())
        }));
    }
    for name in ["sys: apt", "sys: cargo"] {
        let log = Arc::clone(&log);
        jobs.push(Job::new(name, move || {
            log.lock().map_or((), |mut entries| entries.push("sys"));
            Ok(())
        }));
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let summary = run(jobs, 3, &cancel, tx);
    drop(rx);

    assert_eq!(summary.succeeded, 4);
    let entries = log.lock().map(|entries| entries.clone()).unwrap_or_default();
    assert_eq!(entries.iter().filter(|kind| *kind == &"repo").count(), 2);
    assert_eq!(entries.iter().filter(|kind| *kind == &"sys").count(), 2);
}
