//! Retention of finished jobs

use std::time::{Duration, Instant};

/// How long a finished job stays pollable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Time a terminal job is kept after finishing (default: 1 minute)
    pub after_life: Duration,
}

impl RetentionPolicy {
    /// Policy with the given after-life
    pub fn new(after_life: Duration) -> Self {
        Self { after_life }
    }

    /// True when a job that finished at `finished_at` may be dropped at `now`
    ///
    /// Jobs that have not finished never expire.
    pub fn is_expired(&self, finished_at: Option<Instant>, now: Instant) -> bool {
        match finished_at {
            Some(at) => now.saturating_duration_since(at) >= self.after_life,
            None => false,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            after_life: Duration::from_secs(60),
        }
    }
}
