//! Job storage abstraction and the in-memory implementation.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use tailor_core::{JobId, RunId, TailorError};

use super::types::{Job, JobKind, JobStats, JobStatus, RetryPolicy};

pub const LOCK_EXPIRED: &str = "lock expired";

/// Durable queue of `process_run` jobs.
///
/// `claim_next` is the only serialization point between workers: two
/// concurrent callers never receive the same job, and a job held by one
/// claimer is invisible to the others rather than waited on.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a queued job with `attempts = 0`. Duplicate enqueues for one
    /// run create distinct jobs.
    async fn enqueue(&self, run_id: RunId) -> Result<JobId, TailorError>;

    /// Lock the oldest queued job for `worker_id`, bumping `attempts` by one.
    /// Fails with `NoWorkAvailable` when the queue is empty.
    async fn claim_next(&self, worker_id: &str) -> Result<Job, TailorError>;

    /// `running -> done`. `NotFound` unless the job is running.
    async fn mark_done(&self, job_id: JobId) -> Result<(), TailorError>;

    /// `running -> queued` when `requeue`, else `running -> failed`.
    /// `NotFound` unless the job is running.
    async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
        requeue: bool,
    ) -> Result<(), TailorError>;

    async fn get(&self, job_id: JobId) -> Result<Job, TailorError>;

    /// Jobs for a run, oldest first.
    async fn list_for_run(&self, run_id: RunId) -> Result<Vec<Job>, TailorError>;

    /// Release running jobs locked longer than `older_than`: back to
    /// `queued` when attempts remain, otherwise `failed`. Returns the
    /// released jobs in their new state.
    async fn release_stale_locks(&self, older_than: Duration) -> Result<Vec<Job>, TailorError>;

    async fn stats(&self) -> Result<JobStats, TailorError>;
}

pub(crate) fn require_worker_id(worker_id: &str) -> Result<&str, TailorError> {
    let worker_id = worker_id.trim();
    if worker_id.is_empty() {
        return Err(TailorError::invalid_input("worker_id must not be blank"));
    }
    Ok(worker_id)
}

pub(crate) fn stale_cutoff(older_than: Duration) -> Result<chrono::DateTime<Utc>, TailorError> {
    let age = chrono::Duration::from_std(older_than)
        .map_err(|e| TailorError::invalid_input(format!("stale lock threshold: {e}")))?;
    Ok(Utc::now() - age)
}

/// In-memory job store for tests/dev.
///
/// Jobs are kept in insertion order, which is also creation order; claiming
/// happens under a single lock, so it is atomic with respect to other claimers.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    policy: RetryPolicy,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ceiling stamped on jobs enqueued from now on.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy = RetryPolicy::new(max_attempts);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Job>>, TailorError> {
        self.jobs
            .lock()
            .map_err(|_| TailorError::persistence("job store lock poisoned"))
    }
}

fn running_mut(jobs: &mut [Job], job_id: JobId) -> Result<&mut Job, TailorError> {
    jobs.iter_mut()
        .find(|j| j.id == job_id && j.status == JobStatus::Running)
        .ok_or_else(|| TailorError::not_found(format!("running job {job_id}")))
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, run_id: RunId) -> Result<JobId, TailorError> {
        let run_id = run_id.require()?;
        let job = Job::new(JobKind::ProcessRun, run_id, self.policy.max_attempts);
        let id = job.id;
        self.lock()?.push(job);
        Ok(id)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Job, TailorError> {
        let worker_id = require_worker_id(worker_id)?;
        let mut jobs = self.lock()?;
        let job = jobs
            .iter_mut()
            .find(|j| j.kind == JobKind::ProcessRun && j.status == JobStatus::Queued)
            .ok_or(TailorError::NoWorkAvailable)?;
        job.mark_claimed(worker_id, Utc::now());
        Ok(job.clone())
    }

    async fn mark_done(&self, job_id: JobId) -> Result<(), TailorError> {
        let mut jobs = self.lock()?;
        running_mut(&mut jobs, job_id)?.release(JobStatus::Done, None, Utc::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
        requeue: bool,
    ) -> Result<(), TailorError> {
        let status = if requeue { JobStatus::Queued } else { JobStatus::Failed };
        let mut jobs = self.lock()?;
        running_mut(&mut jobs, job_id)?.release(status, Some(error.to_string()), Utc::now());
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Job, TailorError> {
        self.lock()?
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
            .ok_or_else(|| TailorError::not_found(format!("job {job_id}")))
    }

    async fn list_for_run(&self, run_id: RunId) -> Result<Vec<Job>, TailorError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|j| j.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn release_stale_locks(&self, older_than: Duration) -> Result<Vec<Job>, TailorError> {
        let cutoff = stale_cutoff(older_than)?;
        let now = Utc::now();
        let mut released = Vec::new();
        for job in self.lock()?.iter_mut() {
            let stale =
                job.status == JobStatus::Running && job.locked_at.is_some_and(|at| at < cutoff);
            if stale {
                let status = if job.can_retry() { JobStatus::Queued } else { JobStatus::Failed };
                job.release(status, Some(LOCK_EXPIRED.to_string()), now);
                released.push(job.clone());
            }
        }
        Ok(released)
    }

    async fn stats(&self) -> Result<JobStats, TailorError> {
        let mut stats = JobStats::default();
        for job in self.lock()?.iter() {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }
}
