//! Core job types and the retry policy.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_core::{JobId, RunId, TailorError};

/// Work-type tag. Claimers select by kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Analyse one run: score, generate, persist.
    ProcessRun,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ProcessRun => "process_run",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = TailorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process_run" => Ok(JobKind::ProcessRun),
            other => Err(TailorError::invalid_input(format!("unknown job type: {other}"))),
        }
    }
}

/// Job execution status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed
    Queued,
    /// Owned by exactly one worker
    Running,
    /// Terminally failed, never reclaimed
    Failed,
    /// Completed after its run reached `completed`
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
            JobStatus::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TailorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "failed" => Ok(JobStatus::Failed),
            "done" => Ok(JobStatus::Done),
            other => Err(TailorError::invalid_input(format!("unknown job status: {other}"))),
        }
    }
}

/// Requeue-versus-terminal decision for a failed attempt.
///
/// Attempts are counted at claim time, so the policy never touches the
/// counter; it only compares it against the ceiling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn should_requeue(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// A durable unit of work tied to one run.
///
/// `locked_by` is set iff `status == Running`; `attempts` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub run_id: RunId,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, run_id: RunId, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            run_id,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            locked_by: None,
            locked_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    /// Whether a failure of the current attempt should put the job back in the queue.
    pub fn can_retry(&self) -> bool {
        self.retry_policy().should_requeue(self.attempts)
    }

    pub(crate) fn mark_claimed(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.locked_by = Some(worker_id.to_string());
        self.locked_at = Some(now);
        self.attempts += 1;
        self.updated_at = now;
    }

    pub(crate) fn release(&mut self, status: JobStatus, error: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.locked_by = None;
        self.locked_at = None;
        if error.is_some() {
            self.last_error = error;
        }
        self.updated_at = now;
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub queued: u64,
    pub running: u64,
    pub failed: u64,
    pub done: u64,
}

impl JobStats {
    pub(crate) fn record(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Queued => self.queued += count,
            JobStatus::Running => self.running += count,
            JobStatus::Failed => self.failed += count,
            JobStatus::Done => self.done += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.queued + self.running + self.failed + self.done
    }
}
