//! Job status and background job management
//!
//! This crate provides:
//! - Thread-safe job status (counters, state machine, job log)
//! - Poll views for clients watching a job
//! - Background job manager with ULID handles
//! - Retention of finished jobs

pub mod jobs;
pub mod retention;
pub mod status;

// Re-exports
pub use jobs::{JobHandle, JobManager};
pub use retention::RetentionPolicy;
pub use status::{JobState, JobStatus, JobView, StatusSink, StatusSnapshot};

/// Result type for job operations
pub type Result<T> = anyhow::Result<T>;
