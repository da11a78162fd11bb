//! Progress view: consumes runner events and renders per-job state.
//!
//! The model is renderer-agnostic; [`consume_events`] is the simple
//! line-oriented renderer used by the CLI.
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::runner::{Event, JobStatus};

/// Display state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Queued, not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Failed,
    /// Skipped by cancellation.
    Skipped,
}

impl JobState {
    /// Whether this state is terminal.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

/// Per-job view data.
#[derive(Debug, Clone)]
pub struct JobView {
    /// Job display name.
    pub name: String,
    /// Current display state.
    pub state: JobState,
    /// Error text for failed or skipped jobs.
    pub error: String,
    /// Elapsed time once finished.
    pub duration: Option<Duration>,
}

/// Event-driven model of one run.
#[derive(Debug)]
pub struct ProgressModel {
    title: String,
    jobs: Vec<JobView>,
    logs: Vec<String>,
}

impl ProgressModel {
    /// Create a model for the given job names.
    #[must_use]
    pub fn new(title: impl Into<String>, job_names: &[String]) -> Self {
        Self {
            title: title.into(),
            jobs: job_names
                .iter()
                .map(|name| JobView {
                    name: name.clone(),
                    state: JobState::Pending,
                    error: String::new(),
                    duration: None,
                })
                .collect(),
            logs: Vec::new(),
        }
    }

    /// Jobs in index order.
    #[must_use]
    pub fn jobs(&self) -> &[JobView] {
        &self.jobs
    }

    /// Accumulated log lines.
    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Number of jobs in a terminal state.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.state.is_finished()).count()
    }

    /// Apply one runner event.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Started { index, .. } => {
                if let Some(job) = self.jobs.get_mut(*index) {
                    job.state = JobState::Running;
                }
            }
            Event::Finished {
                index,
                name,
                status,
                error,
                duration,
                ..
            } => {
                let error_text = error.clone().unwrap_or_default();
                if let Some(job) = self.jobs.get_mut(*index) {
                    job.state = match status {
                        JobStatus::Success => JobState::Success,
                        JobStatus::Failed => JobState::Failed,
                        JobStatus::Skipped => JobState::Skipped,
                    };
                    job.error = error_text.clone();
                    job.duration = Some(*duration);
                }
                self.logs.push(match status {
                    JobStatus::Success => {
                        format!("完了: {name} ({:.1}s)", duration.as_secs_f64())
                    }
                    JobStatus::Failed => format!("失敗: {name}: {error_text}"),
                    JobStatus::Skipped => format!("スキップ: {name}: {error_text}"),
                });
            }
        }
    }

    /// One-line status summary with a progress bar.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn status_line(&self) -> String {
        let total = self.jobs.len();
        let finished = self.finished_count();
        let percent = if total == 0 {
            1.0
        } else {
            finished as f64 / total as f64
        };
        format!(
            "{} {} {finished}/{total}",
            self.title,
            render_bar(percent, 10)
        )
    }
}

/// Render a fixed-width progress bar, clamping out-of-range percentages.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn render_bar(percent: f64, width: usize) -> String {
    let clamped = percent.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((clamped * width as f64).round() as usize).min(width);
    format!("[{}{}]", "=".repeat(filled), "-".repeat(width - filled))
}

/// Indicative completion fraction for one job state.
///
/// Running jobs oscillate between 0.2 and 0.7 with the animation frame so
/// the bar visibly moves while a job is in flight.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_percent(state: JobState, frame: usize) -> f64 {
    match state {
        JobState::Pending => 0.0,
        JobState::Running => 0.2 + 0.5 * ((frame % 10) as f64 / 10.0),
        JobState::Success | JobState::Failed | JobState::Skipped => 1.0,
    }
}

/// Consume every event, printing one log line per finished job.
///
/// Lines are truncated to the terminal width when one can be determined.
#[allow(clippy::print_stdout)]
pub fn consume_events(rx: &Receiver<Event>, model: &mut ProgressModel) {
    let width = terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| usize::from(w));
    while let Ok(event) = rx.recv() {
        model.apply(&event);
        if matches!(event, Event::Finished { .. })
            && let Some(line) = model.logs().last()
        {
            println!("{}", truncate_line(line, width));
        }
    }
}

fn truncate_line(line: &str, width: Option<usize>) -> String {
    let Some(width) = width else {
        return line.to_string();
    };
    if width == 0 || line.chars().count() <= width {
        return line.to_string();
    }
    let mut truncated: String = line.chars().take(width.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::runner::JobStatus;
    use std::time::SystemTime;

    fn started(index: usize, name: &str) -> Event {
        Event::Started {
            index,
            name: name.to_string(),
            at: SystemTime::now(),
        }
    }

    fn finished(index: usize, name: &str, status: JobStatus, error: Option<&str>) -> Event {
        Event::Finished {
            index,
            name: name.to_string(),
            status,
            error: error.map(ToString::to_string),
            duration: Duration::from_millis(200),
            at: SystemTime::now(),
        }
    }

    fn model() -> ProgressModel {
        ProgressModel::new("test", &["job-1".to_string()])
    }

    // -----------------------------------------------------------------------
    // apply
    // -----------------------------------------------------------------------

    #[test]
    fn success_event_logs_completion() {
        let mut m = model();
        m.apply(&started(0, "job-1"));
        assert_eq!(m.jobs()[0].state, JobState::Running);

        m.apply(&finished(0, "job-1", JobStatus::Success, None));
        assert_eq!(m.jobs()[0].state, JobState::Success);
        assert!(m.logs().iter().any(|line| line.contains("完了: job-1")));
    }

    #[test]
    fn failure_event_logs_error() {
        let mut m = model();
        m.apply(&started(0, "job-1"));
        m.apply(&finished(0, "job-1", JobStatus::Failed, Some("boom")));

        assert_eq!(m.jobs()[0].state, JobState::Failed);
        assert!(m.jobs()[0].error.contains("boom"));
        assert!(m.logs().iter().any(|line| line.contains("失敗: job-1")));
    }

    #[test]
    fn skipped_event_without_start() {
        let mut m = model();
        m.apply(&finished(
            0,
            "job-1",
            JobStatus::Skipped,
            Some("キャンセルされました"),
        ));

        assert_eq!(m.jobs()[0].state, JobState::Skipped);
        assert!(m.jobs()[0].error.contains("キャンセル"));
        assert!(m.logs().iter().any(|line| line.contains("スキップ: job-1")));
    }

    #[test]
    fn finished_count_tracks_terminal_states() {
        let mut m = ProgressModel::new("t", &["a".to_string(), "b".to_string()]);
        assert_eq!(m.finished_count(), 0);
        m.apply(&started(0, "a"));
        assert_eq!(m.finished_count(), 0);
        m.apply(&finished(0, "a", JobStatus::Success, None));
        assert_eq!(m.finished_count(), 1);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut m = model();
        m.apply(&finished(9, "ghost", JobStatus::Success, None));
        assert_eq!(m.jobs()[0].state, JobState::Pending);
        assert_eq!(m.logs().len(), 1, "log line is still recorded");
    }

    // -----------------------------------------------------------------------
    // render_bar / progress_percent
    // -----------------------------------------------------------------------

    #[test]
    fn render_bar_clamps_below_zero() {
        insta::assert_snapshot!(render_bar(-1.0, 10), @"[----------]");
    }

    #[test]
    fn render_bar_half() {
        insta::assert_snapshot!(render_bar(0.5, 10), @"[=====-----]");
    }

    #[test]
    fn render_bar_clamps_above_one() {
        insta::assert_snapshot!(render_bar(2.0, 10), @"[==========]");
    }

    #[test]
    fn progress_percent_pending_is_zero() {
        assert!((progress_percent(JobState::Pending, 0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_percent_running_oscillates_in_band() {
        for frame in 0..30 {
            let p = progress_percent(JobState::Running, frame);
            assert!((0.2..=0.7).contains(&p), "frame {frame} out of band: {p}");
        }
    }

    #[test]
    fn progress_percent_terminal_is_one() {
        assert!((progress_percent(JobState::Success, 3) - 1.0).abs() < f64::EPSILON);
        assert!((progress_percent(JobState::Skipped, 3) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn status_line_counts_finished() {
        let mut m = ProgressModel::new("repo update", &["a".to_string(), "b".to_string()]);
        m.apply(&finished(0, "a", JobStatus::Success, None));
        insta::assert_snapshot!(m.status_line(), @"repo update [=====-----] 1/2");
    }

    // -----------------------------------------------------------------------
    // truncate_line
    // -----------------------------------------------------------------------

    #[test]
    fn truncate_line_passes_short_lines() {
        assert_eq!(truncate_line("ok", Some(10)), "ok");
        assert_eq!(truncate_line("ok", None), "ok");
    }

    #[test]
    fn truncate_line_appends_ellipsis() {
        assert_eq!(truncate_line("abcdefghij", Some(5)), "abcd…");
    }
}
