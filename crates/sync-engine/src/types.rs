// crates/sync-engine/src/types.rs
//! Outcomes, reports and bookkeeping types shared by the worker and scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Identifier handed out when work is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What one sync run achieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Products written to the cache after filtering
    pub products_cached: usize,
    /// Products the server returned but that were unavailable
    pub products_skipped: usize,
    /// Pings the server accepted
    pub pings_sent: usize,
    /// Pings left unsynced for the next run
    pub pings_failed: usize,
    /// Synced pings removed for age
    pub pings_pruned: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            products_cached: 0,
            products_skipped: 0,
            pings_sent: 0,
            pings_failed: 0,
            pings_pruned: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} products cached ({} skipped), {} pings sent, {} pending, {} pruned in {} ms",
            self.products_cached,
            self.products_skipped,
            self.pings_sent,
            self.pings_failed,
            self.pings_pruned,
            self.duration().as_millis()
        )
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::started()
    }
}

/// Result of one worker run, as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOutcome {
    Success(SyncReport),
    /// Run again after backoff
    Retry(String),
    /// Give up until the next period
    Failure(String),
}

impl WorkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkOutcome::Success(_))
    }
}

/// Answer to an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Enqueued(WorkId),
    /// Work with the same key was already scheduled; the request was dropped
    AlreadyScheduled(WorkId),
}

impl EnqueueResult {
    pub fn id(&self) -> WorkId {
        match self {
            EnqueueResult::Enqueued(id) | EnqueueResult::AlreadyScheduled(id) => *id,
        }
    }
}

/// Conditions a run waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub requires_network: bool,
}

impl Constraints {
    pub fn network() -> Self {
        Self {
            requires_network: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkState {
    /// Waiting for its next period
    Enqueued,
    /// Constraint not met yet
    Blocked,
    Running,
    /// Waiting out a backoff delay
    Retrying,
    Succeeded,
    Failed,
}

impl WorkState {
    pub fn is_finished(&self) -> bool {
        matches!(self, WorkState::Succeeded | WorkState::Failed)
    }
}

/// Snapshot of a scheduled job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkInfo {
    pub id: WorkId,
    pub key: String,
    pub periodic: bool,
    pub state: WorkState,
    /// Zero-based attempt of the current or last run
    pub run_attempt: usize,
    /// Completed cycles, successful or not
    pub cycles: u64,
    pub last_outcome: Option<WorkOutcome>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl WorkInfo {
    pub(crate) fn new(key: &str, periodic: bool) -> Self {
        Self {
            id: WorkId::new(),
            key: key.to_string(),
            periodic,
            state: WorkState::Enqueued,
            run_attempt: 0,
            cycles: 0,
            last_outcome: None,
            last_run_at: None,
        }
    }
}
