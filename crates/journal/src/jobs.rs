//! Background job manager
//!
//! Runs each job on its own named thread and keeps its [`JobStatus`]
//! pollable until the retention after-life has passed.

use crate::retention::RetentionPolicy;
use crate::status::{JobStatus, StatusSink};
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use ulid::Ulid;

/// Opaque job handle, stored by pollers as a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(Ulid);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobHandle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let ulid = Ulid::from_string(s.trim())
            .map_err(|e| anyhow::anyhow!("Invalid job handle '{}': {}", s, e))?;
        Ok(Self(ulid))
    }
}

struct JobEntry {
    status: Arc<JobStatus>,
    retention: RetentionPolicy,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of background jobs
pub struct JobManager {
    jobs: RwLock<BTreeMap<Ulid, Arc<JobEntry>>>,
    retention: RetentionPolicy,
}

impl JobManager {
    /// Manager with the default retention policy
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    /// Manager with a custom retention policy
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            retention,
        }
    }

    /// Start a job with the manager's retention policy
    pub fn start<F>(&self, name: &str, work: F) -> Result<JobHandle>
    where
        F: FnOnce(&JobStatus) + Send + 'static,
    {
        self.start_with_retention(name, self.retention, work)
    }

    /// Start a job on a background thread
    ///
    /// A panic escaping `work` marks the job failed. Work that returns
    /// without reaching a terminal state is marked finished.
    pub fn start_with_retention<F>(
        &self,
        name: &str,
        retention: RetentionPolicy,
        work: F,
    ) -> Result<JobHandle>
    where
        F: FnOnce(&JobStatus) + Send + 'static,
    {
        let id = Ulid::new();
        let status = Arc::new(JobStatus::new(name));
        let thread_status = Arc::clone(&status);

        let thread = std::thread::Builder::new()
            .name(format!("job-{}", name))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&thread_status)));
                match outcome {
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(job = %thread_status.name(), "Job panicked: {}", message);
                        thread_status.log_error(&format!("Job panicked: {}", message));
                        thread_status.mark_failed();
                    }
                    Ok(()) if !thread_status.is_done() => thread_status.mark_finished(),
                    Ok(()) => {}
                }
            })
            .with_context(|| format!("Failed to spawn thread for job '{}'", name))?;

        self.jobs.write().insert(
            id,
            Arc::new(JobEntry {
                status,
                retention,
                thread: Mutex::new(Some(thread)),
            }),
        );

        tracing::info!(job = name, handle = %id, "Started job");
        Ok(JobHandle(id))
    }

    /// Status of a job, `None` once purged or for unknown handles
    pub fn status(&self, handle: &JobHandle) -> Option<Arc<JobStatus>> {
        self.jobs
            .read()
            .get(&handle.0)
            .map(|entry| Arc::clone(&entry.status))
    }

    /// Block until the job's thread exits
    pub fn wait(&self, handle: &JobHandle) -> Option<Arc<JobStatus>> {
        let entry = self.jobs.read().get(&handle.0).cloned()?;
        let thread = entry.thread.lock().take();
        if let Some(thread) = thread {
            // Panics are caught inside the thread
            let _ = thread.join();
        }
        Some(Arc::clone(&entry.status))
    }

    /// Drop terminal jobs whose after-life has passed; returns how many
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, entry| !entry.retention.is_expired(entry.status.finished_at(), now));
        before - jobs.len()
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// True when no jobs are tracked
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
