//! Worker loop: claim, process, reconcile.
//!
//! Each tick runs at most one claim-and-process cycle:
//!
//! - no job: nothing happens until the next tick
//! - claimed: run goes to `processing`; if that write fails the job is
//!   failed-or-requeued and the pipeline is skipped
//! - pipeline ok: run goes to `completed`, then the job to `done`; if the
//!   run write fails the job is forced to `failed` (side effects already
//!   happened, so no requeue)
//! - pipeline error: run goes to `failed` (best-effort), then the job is
//!   failed-or-requeued by the retry policy
//!
//! A job is never `done` unless its run reached `completed` first.

pub mod schedule;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

use tailor_core::{JobId, RunId, TailorError};

use crate::jobs::{Job, JobStore, LOCK_EXPIRED};
use crate::pipeline::ReportPipeline;
use crate::runs::{RunStateTracker, RunStatusWriter};

pub use schedule::TickSchedule;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a claimed job left the cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Done,
    Requeued,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleOutcome {
    pub job_id: JobId,
    pub run_id: RunId,
    /// Attempt number this cycle consumed.
    pub attempts: u32,
    pub disposition: Disposition,
}

impl CycleOutcome {
    fn new(job: &Job, disposition: Disposition) -> Self {
        Self {
            job_id: job.id,
            run_id: job.run_id,
            attempts: job.attempts,
            disposition,
        }
    }
}

pub struct Worker {
    worker_id: String,
    jobs: Arc<dyn JobStore>,
    tracker: RunStateTracker,
    pipeline: ReportPipeline,
    schedule: TickSchedule,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        jobs: Arc<dyn JobStore>,
        runs: Arc<dyn RunStatusWriter>,
        pipeline: ReportPipeline,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            jobs,
            tracker: RunStateTracker::new(runs),
            pipeline,
            schedule: TickSchedule::new(DEFAULT_POLL_INTERVAL),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.schedule = TickSchedule::new(interval);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// One claim-and-process cycle.
    ///
    /// Returns `NoWorkAvailable` on an empty queue. Pipeline and run-status
    /// failures are reconciled into the outcome; only claim or job-store
    /// failures surface as errors.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn process_next(&self) -> Result<CycleOutcome, TailorError> {
        let job = self.jobs.claim_next(&self.worker_id).await?;
        info!(
            job_id = %job.id,
            run_id = %job.run_id,
            attempts = job.attempts,
            max_attempts = job.max_attempts,
            "claimed job"
        );

        if let Err(err) = self.tracker.mark_processing(job.run_id).await {
            error!(run_id = %job.run_id, error = %err, "failed to mark run processing");
            let reason = format!("failed to update run status: {err}");
            let disposition = self.fail_job(&job, &reason, job.can_retry()).await?;
            return Ok(CycleOutcome::new(&job, disposition));
        }

        if let Err(err) = self.pipeline.process(job.run_id).await {
            let reason = err.to_string();
            error!(
                job_id = %job.id,
                run_id = %job.run_id,
                error = %reason,
                retryable = err.is_retryable(),
                "failed to process run"
            );
            if let Err(mark_err) = self.tracker.mark_failed(job.run_id, &reason).await {
                error!(run_id = %job.run_id, error = %mark_err, "failed to mark run failed");
            }
            let disposition = self.fail_job(&job, &reason, job.can_retry()).await?;
            return Ok(CycleOutcome::new(&job, disposition));
        }

        if let Err(err) = self.tracker.mark_completed(job.run_id).await {
            error!(run_id = %job.run_id, error = %err, "failed to mark run completed");
            let reason = format!("failed to update run status: {err}");
            if let Err(mark_err) = self.tracker.mark_failed(job.run_id, &reason).await {
                error!(run_id = %job.run_id, error = %mark_err, "failed to mark run failed");
            }
            let disposition = self.fail_job(&job, &reason, false).await?;
            return Ok(CycleOutcome::new(&job, disposition));
        }

        self.jobs.mark_done(job.id).await?;
        info!(job_id = %job.id, run_id = %job.run_id, attempts = job.attempts, "job completed");
        Ok(CycleOutcome::new(&job, Disposition::Done))
    }

    async fn fail_job(
        &self,
        job: &Job,
        reason: &str,
        requeue: bool,
    ) -> Result<Disposition, TailorError> {
        self.jobs.mark_failed(job.id, reason, requeue).await?;
        if requeue {
            warn!(
                job_id = %job.id,
                run_id = %job.run_id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                "job requeued"
            );
            Ok(Disposition::Requeued)
        } else {
            error!(
                job_id = %job.id,
                run_id = %job.run_id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                error = %reason,
                "job failed"
            );
            Ok(Disposition::Failed)
        }
    }

    /// Release jobs whose lock outlived `older_than` and fail their runs.
    ///
    /// Runs go to `failed` whether the job was requeued or exhausted, the
    /// same as after a pipeline error; a requeued job moves its run back to
    /// `processing` when it is claimed again. Returns the number of jobs
    /// released.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn release_stale_locks(&self, older_than: Duration) -> Result<u64, TailorError> {
        let released = self.jobs.release_stale_locks(older_than).await?;
        if released.is_empty() {
            return Ok(0);
        }

        for job in &released {
            if let Err(err) = self.tracker.mark_failed(job.run_id, LOCK_EXPIRED).await {
                error!(run_id = %job.run_id, error = %err, "failed to mark run failed");
            }
        }

        let failed = released.iter().filter(|j| j.status.is_terminal()).count();
        warn!(
            released = released.len(),
            failed,
            requeued = released.len() - failed,
            "released stale job locks"
        );
        Ok(released.len() as u64)
    }

    /// One scheduled cycle. Never fails: an empty queue is silent, anything
    /// else is logged.
    pub async fn tick(&self) {
        match self.process_next().await {
            Ok(_) => {}
            Err(err) if err.is_no_work() => {
                trace!(worker_id = %self.worker_id, "no work available");
            }
            Err(err) => {
                error!(worker_id = %self.worker_id, error = %err, "worker cycle failed");
            }
        }
    }

    /// Poll until `cancel` fires, one cycle per tick.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.schedule.interval().as_millis() as u64,
            "worker started"
        );
        let cycles = self.schedule.run(cancel, || self.tick()).await;
        info!(worker_id = %self.worker_id, cycles, "worker stopped");
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("worker_id", &self.worker_id)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}
