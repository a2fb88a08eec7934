use std::time::Duration as HttpTimeout;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Delay between consecutive step reveals.
pub const REVEAL_INTERVAL_MS: i64 = 500;

/// Port over the external task-decomposition service.
pub trait Decompose {
    fn decompose(&self, task: &str) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct StepsResponse {
    #[serde(default)]
    steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// `POST { task } -> { steps }` client. Callers never retry; failures fall
/// back to the fixed generic steps.
#[derive(Debug)]
pub struct HttpDecomposer {
    url: String,
}

impl HttpDecomposer {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl Decompose for HttpDecomposer {
    #[tracing::instrument(skip(self, task))]
    fn decompose(&self, task: &str) -> anyhow::Result<Vec<String>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HttpTimeout::from_secs(30))
            .build()
            .context("failed to build http client")?;

        let response = client
            .post(&self.url)
            .json(&serde_json::json!({ "task": task }))
            .send()
            .with_context(|| format!("failed to reach decomposition service at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            // The service reports failures as { "error": ... }.
            let detail = response
                .json::<ErrorResponse>()
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(anyhow!("decomposition service failed: {detail}"));
        }

        let parsed: StepsResponse = response
            .json()
            .context("decomposition service returned malformed json")?;
        if parsed.steps.is_empty() {
            return Err(anyhow!("decomposition service returned no steps"));
        }

        debug!(steps = parsed.steps.len(), "task decomposed");
        Ok(parsed.steps)
    }
}

/// Generic steps shown when the service is unavailable, so the panel always
/// has something to reveal.
pub fn fallback_steps() -> Vec<String> {
    [
        "Start timer (5m)",
        "Do first step",
        "Take a breath",
        "Keep going",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub text: String,
    pub checked: bool,
}

/// One decomposition run: its steps plus the reveal schedule. Steps become
/// visible one per interval from the start timestamp; the schedule is a
/// pure function of `now`, so the CLI sleeps against it and tests pass
/// virtual time.
#[derive(Debug, Clone)]
pub struct Breakdown {
    pub task: String,
    /// True when the steps are the local fallback after a service failure.
    /// The failure is visible but non-blocking.
    pub failed: bool,
    steps: Vec<Step>,
    started: DateTime<Utc>,
}

impl Breakdown {
    fn new(task: &str, steps: Vec<String>, failed: bool, now: DateTime<Utc>) -> Self {
        Self {
            task: task.to_string(),
            failed,
            steps: steps
                .into_iter()
                .map(|text| Step {
                    text,
                    checked: false,
                })
                .collect(),
            started: now,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn revealed_count(&self, now: DateTime<Utc>) -> usize {
        let elapsed_ms = (now - self.started).num_milliseconds();
        if elapsed_ms < 0 {
            return 0;
        }
        let due = (elapsed_ms / REVEAL_INTERVAL_MS) as usize + 1;
        due.min(self.steps.len())
    }

    pub fn revealed(&self, now: DateTime<Utc>) -> &[Step] {
        &self.steps[..self.revealed_count(now)]
    }

    pub fn all_revealed(&self, now: DateTime<Utc>) -> bool {
        self.revealed_count(now) == self.steps.len()
    }

    pub fn toggle_step(&mut self, index: usize) -> bool {
        let Some(step) = self.steps.get_mut(index) else {
            return false;
        };
        step.checked = !step.checked;
        true
    }
}

/// The panel state: at most one breakdown at a time. Starting a new one or
/// resetting drops the previous run, cancelling its pending reveals in
/// bulk.
#[derive(Debug, Default)]
pub struct TaskBreaker {
    current: Option<Breakdown>,
}

impl TaskBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Breakdown> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Breakdown> {
        self.current.as_mut()
    }

    /// Runs the decomposition once (no retry) and installs the result. On
    /// failure the fallback steps install with the failure flagged.
    #[tracing::instrument(skip(self, service, now))]
    pub fn start(
        &mut self,
        service: &dyn Decompose,
        task: &str,
        now: DateTime<Utc>,
    ) -> Option<&Breakdown> {
        let task = task.trim();
        if task.is_empty() {
            return None;
        }

        let breakdown = match service.decompose(task) {
            Ok(steps) => {
                info!(steps = steps.len(), "breakdown ready");
                Breakdown::new(task, steps, false, now)
            }
            Err(err) => {
                warn!(error = %err, "decomposition failed; using fallback steps");
                Breakdown::new(task, fallback_steps(), true, now)
            }
        };
        self.current = Some(breakdown);
        self.current()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Decompose, REVEAL_INTERVAL_MS, TaskBreaker, fallback_steps};

    struct StubService {
        response: anyhow::Result<Vec<String>>,
    }

    impl StubService {
        fn ok(steps: &[&str]) -> Self {
            Self {
                response: Ok(steps.iter().map(|s| s.to_string()).collect()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(anyhow::anyhow!("{message}")),
            }
        }
    }

    impl Decompose for StubService {
        fn decompose(&self, _task: &str) -> anyhow::Result<Vec<String>> {
            match &self.response {
                Ok(steps) => Ok(steps.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn steps_reveal_one_per_interval() {
        let mut breaker = TaskBreaker::new();
        let service = StubService::ok(&["Open the doc", "Write one line", "Save it"]);
        breaker
            .start(&service, "write the report", now())
            .expect("started");
        let breakdown = breaker.current().expect("current");

        assert_eq!(breakdown.revealed_count(now()), 1);
        let later = now() + Duration::milliseconds(REVEAL_INTERVAL_MS);
        assert_eq!(breakdown.revealed_count(later), 2);
        let done = now() + Duration::milliseconds(REVEAL_INTERVAL_MS * 10);
        assert_eq!(breakdown.revealed_count(done), 3);
        assert!(breakdown.all_revealed(done));
    }

    #[test]
    fn service_failure_falls_back_with_visible_error() {
        let mut breaker = TaskBreaker::new();
        let service = StubService::failing("decomposition service failed: 500 Internal Server Error");
        breaker.start(&service, "clean the garage", now()).expect("started");

        let breakdown = breaker.current().expect("current");
        assert!(breakdown.failed);
        let texts: Vec<&str> = breakdown.steps().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, fallback_steps());
        // The fallback still reveals with the stagger.
        assert_eq!(breakdown.revealed_count(now()), 1);
    }

    #[test]
    fn new_breakdown_cancels_pending_reveals() {
        let mut breaker = TaskBreaker::new();
        let service = StubService::ok(&["a", "b", "c", "d", "e", "f"]);
        breaker.start(&service, "first task", now()).expect("started");

        // Restart before the first run fully revealed.
        let restart_at = now() + Duration::milliseconds(REVEAL_INTERVAL_MS);
        breaker.start(&service, "second task", restart_at).expect("restarted");

        let breakdown = breaker.current().expect("current");
        assert_eq!(breakdown.task, "second task");
        // The schedule restarted: only the first step is due again.
        assert_eq!(breakdown.revealed_count(restart_at), 1);

        breaker.reset();
        assert!(breaker.current().is_none());
    }

    #[test]
    fn blank_task_does_not_start() {
        let mut breaker = TaskBreaker::new();
        let service = StubService::ok(&["a"]);
        assert!(breaker.start(&service, "   ", now()).is_none());
    }

    #[test]
    fn revealed_steps_are_checkable() {
        let mut breaker = TaskBreaker::new();
        let service = StubService::ok(&["a", "b"]);
        breaker.start(&service, "task", now()).expect("started");

        let breakdown = breaker.current_mut().expect("current");
        assert!(breakdown.toggle_step(0));
        assert!(breakdown.steps()[0].checked);
        assert!(!breakdown.toggle_step(9));
    }
}
