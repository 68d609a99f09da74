//! Job status shared between a background import and its pollers

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lifecycle of a job: `Idle -> Running -> {Finished, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, not started yet
    Idle,
    /// Work in progress
    Running,
    /// Completed normally
    Finished,
    /// Aborted by a batch-fatal error
    Failed,
}

impl JobState {
    /// No transitions leave a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }
}

/// Progress and error sink written by the import driver
pub trait StatusSink: Send + Sync {
    /// Enter `Running`
    fn mark_running(&self);
    /// Number of units the job will process
    fn set_total(&self, total: u64);
    /// One more unit processed
    fn increment_processed(&self);
    /// Append an error line to the job log
    fn log_error(&self, message: &str);
    /// Append an error and its source chain to the job log
    fn log_exception(&self, error: &(dyn std::error::Error + 'static));
    /// Enter `Failed`
    fn mark_failed(&self);
    /// Enter `Finished`
    fn mark_finished(&self);
}

/// Thread-safe job status
pub struct JobStatus {
    name: String,
    state: RwLock<JobState>,
    total: AtomicU64,
    processed: AtomicU64,
    messages: Mutex<Vec<String>>,
    finished_at: Mutex<Option<Instant>>,
}

impl JobStatus {
    /// Create an idle status for the named job
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(JobState::Idle),
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            messages: Mutex::new(Vec::new()),
            finished_at: Mutex::new(None),
        }
    }

    /// Job name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    /// True once the job reached `Finished` or `Failed`
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// True when the job failed
    pub fn failed(&self) -> bool {
        self.state() == JobState::Failed
    }

    /// Units to process
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Units processed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Copy of the job log
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// When the job reached a terminal state
    pub fn finished_at(&self) -> Option<Instant> {
        *self.finished_at.lock()
    }

    /// Append an informational line to the job log
    pub fn log_info(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }

    /// Consistent copy for pollers
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            name: self.name.clone(),
            state: self.state(),
            total: self.total(),
            processed: self.processed(),
            messages: self.messages(),
        }
    }

    fn transition(&self, to: JobState) -> bool {
        let mut state = self.state.write();
        let allowed = match (*state, to) {
            (JobState::Idle, JobState::Running) => true,
            (JobState::Idle | JobState::Running, JobState::Finished | JobState::Failed) => true,
            _ => false,
        };

        if !allowed {
            tracing::warn!(job = %self.name, from = ?*state, to = ?to, "Ignoring job state transition");
            return false;
        }

        *state = to;
        if to.is_terminal() {
            *self.finished_at.lock() = Some(Instant::now());
        }
        true
    }
}

impl StatusSink for JobStatus {
    fn mark_running(&self) {
        self.transition(JobState::Running);
    }

    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn log_error(&self, message: &str) {
        tracing::debug!(job = %self.name, "{}", message);
        self.messages.lock().push(message.to_string());
    }

    fn log_exception(&self, error: &(dyn std::error::Error + 'static)) {
        let mut text = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }

        tracing::error!(job = %self.name, "{}", text);
        self.messages.lock().push(text);
    }

    fn mark_failed(&self) {
        self.transition(JobState::Failed);
    }

    fn mark_finished(&self) {
        self.transition(JobState::Finished);
    }
}

/// Point-in-time copy of a [`JobStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub name: String,
    pub state: JobState,
    pub total: u64,
    pub processed: u64,
    pub messages: Vec<String>,
}

impl StatusSnapshot {
    /// What a polling client should display
    pub fn view(&self) -> JobView {
        match self.state {
            JobState::Idle => JobView::Queued,
            JobState::Running => JobView::Running {
                processed: self.processed,
                total: self.total,
            },
            JobState::Finished => JobView::Done {
                messages: self.messages.clone(),
            },
            JobState::Failed => JobView::Failed {
                messages: self.messages.clone(),
            },
        }
    }

    /// JSON form for the polling endpoint
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Page a polling client renders for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum JobView {
    Queued,
    Running { processed: u64, total: u64 },
    Done { messages: Vec<String> },
    Failed { messages: Vec<String> },
}

impl JobView {
    /// Text shown to the operator
    pub fn text(&self) -> String {
        match self {
            JobView::Queued => "Queued.".to_string(),
            JobView::Running { processed, total } => {
                format!("Processed {} of {}.", processed, total)
            }
            JobView::Done { messages } | JobView::Failed { messages } => messages.join("\n"),
        }
    }
}
