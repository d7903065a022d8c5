//! Postgres-backed job queue.
//!
//! ## Claiming
//!
//! `claim_next` runs inside one transaction:
//! 1. `SELECT ... FOR UPDATE SKIP LOCKED` picks the oldest queued job that no
//!    other transaction holds
//! 2. the same row is flipped to `running`, stamped with the worker and lock
//!    time, and `attempts` is incremented
//! 3. the transaction commits
//!
//! Rows locked by a concurrent claimer are skipped, not waited on, so
//! workers never block each other and never receive the same job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{debug, instrument};

use tailor_core::{JobId, RunId, TailorError};

use super::store::{require_worker_id, stale_cutoff, JobStore, LOCK_EXPIRED};
use super::types::{Job, JobKind, JobStats, JobStatus, RetryPolicy};
use crate::db::{map_sqlx_error, to_u32, to_u64};

const JOB_COLUMNS: &str = "id, type, run_id, status, attempts, max_attempts, locked_by, locked_at, last_error, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
    policy: RetryPolicy,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            policy: RetryPolicy::default(),
        }
    }

    /// Ceiling stamped on jobs enqueued through this store.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy = RetryPolicy::new(max_attempts);
        self
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self), fields(run_id = %run_id), err)]
    async fn enqueue(&self, run_id: RunId) -> Result<JobId, TailorError> {
        let run_id = run_id.require()?;
        let job_id = JobId::new();
        let max_attempts = i32::try_from(self.policy.max_attempts)
            .map_err(|_| TailorError::invalid_input("max_attempts out of range"))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, type, run_id, status, attempts, max_attempts)
            VALUES ($1, $2, $3, $4, 0, $5)
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(JobKind::ProcessRun.as_str())
        .bind(run_id.as_uuid())
        .bind(JobStatus::Queued.as_str())
        .bind(max_attempts)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enqueue", e))?;

        debug!(job_id = %job_id, "job enqueued");
        Ok(job_id)
    }

    #[instrument(skip(self), err(level = "debug"))]
    async fn claim_next(&self, worker_id: &str) -> Result<Job, TailorError> {
        let worker_id = require_worker_id(worker_id)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("claim_next", e))?;

        let candidate: Option<uuid::Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM jobs
            WHERE type = $1 AND status = $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(JobKind::ProcessRun.as_str())
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_next", e))?;

        let Some(job_id) = candidate else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("claim_next", e))?;
            return Err(TailorError::NoWorkAvailable);
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = $1,
                locked_by = $2,
                locked_at = now(),
                attempts = attempts + 1,
                updated_at = now()
            WHERE id = $3
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(JobStatus::Running.as_str())
        .bind(worker_id)
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_next", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("claim_next", e))?;

        JobRow::from_row(&row)
            .map_err(|e| map_sqlx_error("claim_next", e))?
            .into_job("claim_next")
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn mark_done(&self, job_id: JobId) -> Result<(), TailorError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                locked_by = NULL,
                locked_at = NULL,
                updated_at = now()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(JobStatus::Done.as_str())
        .bind(job_id.as_uuid())
        .bind(JobStatus::Running.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_done", e))?;

        if result.rows_affected() == 0 {
            return Err(TailorError::not_found(format!("running job {job_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, error), fields(job_id = %job_id), err)]
    async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
        requeue: bool,
    ) -> Result<(), TailorError> {
        let status = if requeue { JobStatus::Queued } else { JobStatus::Failed };

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                last_error = $2,
                locked_by = NULL,
                locked_at = NULL,
                updated_at = now()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(job_id.as_uuid())
        .bind(JobStatus::Running.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_failed", e))?;

        if result.rows_affected() == 0 {
            return Err(TailorError::not_found(format!("running job {job_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Job, TailorError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?
            .ok_or_else(|| TailorError::not_found(format!("job {job_id}")))?;

        JobRow::from_row(&row)
            .map_err(|e| map_sqlx_error("get_job", e))?
            .into_job("get_job")
    }

    #[instrument(skip(self), fields(run_id = %run_id), err)]
    async fn list_for_run(&self, run_id: RunId) -> Result<Vec<Job>, TailorError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE run_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(run_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_run", e))?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let job = JobRow::from_row(&row)
                .map_err(|e| map_sqlx_error("list_for_run", e))?
                .into_job("list_for_run")?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    #[instrument(skip(self), err)]
    async fn release_stale_locks(&self, older_than: Duration) -> Result<Vec<Job>, TailorError> {
        let cutoff = stale_cutoff(older_than)?;

        let rows = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts < max_attempts THEN $1 ELSE $2 END,
                last_error = $3,
                locked_by = NULL,
                locked_at = NULL,
                updated_at = now()
            WHERE status = $4 AND locked_at < $5
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Failed.as_str())
        .bind(LOCK_EXPIRED)
        .bind(JobStatus::Running.as_str())
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release_stale_locks", e))?;

        let mut released = Vec::with_capacity(rows.len());
        for row in rows {
            let job = JobRow::from_row(&row)
                .map_err(|e| map_sqlx_error("release_stale_locks", e))?
                .into_job("release_stale_locks")?;
            released.push(job);
        }
        Ok(released)
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<JobStats, TailorError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM jobs GROUP BY status")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job_stats", e))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("job_stats", e))?;
            let count: i64 = row.try_get("count").map_err(|e| map_sqlx_error("job_stats", e))?;
            stats.record(status.parse::<JobStatus>()?, to_u64("job_stats", count)?);
        }
        Ok(stats)
    }
}

// SQLx row types

#[derive(Debug)]
struct JobRow {
    id: uuid::Uuid,
    kind: String,
    run_id: uuid::Uuid,
    status: String,
    attempts: i32,
    max_attempts: i32,
    locked_by: Option<String>,
    locked_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            kind: row.try_get("type")?,
            run_id: row.try_get("run_id")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            locked_by: row.try_get("locked_by")?,
            locked_at: row.try_get("locked_at")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl JobRow {
    fn into_job(self, operation: &str) -> Result<Job, TailorError> {
        let corrupt = |e: TailorError| {
            TailorError::persistence(format!("corrupt job row in {operation}: {e}"))
        };
        Ok(Job {
            id: JobId::from_uuid(self.id),
            kind: self.kind.parse::<JobKind>().map_err(corrupt)?,
            run_id: RunId::from_uuid(self.run_id),
            status: self.status.parse::<JobStatus>().map_err(corrupt)?,
            attempts: to_u32(operation, self.attempts)?,
            max_attempts: to_u32(operation, self.max_attempts)?,
            locked_by: self.locked_by,
            locked_at: self.locked_at,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
