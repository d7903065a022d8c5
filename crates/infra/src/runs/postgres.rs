//! Postgres-backed run store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use tailor_core::{ResumeId, Run, RunId, RunStatus, TailorError, UserId};

use super::{page_limit, validate_new_run, RunLookup, RunRepository, RunStatusWriter};
use crate::db::map_sqlx_error;

const RUN_COLUMNS: &str = "id, user_id, resume_id, job_text, status, error_message, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresRunStore {
    pool: Arc<PgPool>,
}

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl RunLookup for PostgresRunStore {
    #[instrument(skip(self), fields(run_id = %run_id), err)]
    async fn get_run_by_id(&self, run_id: RunId) -> Result<Run, TailorError> {
        let run_id = run_id.require()?;
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1"))
            .bind(run_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_run_by_id", e))?
            .ok_or_else(|| TailorError::not_found(format!("run {run_id}")))?;

        RunRow::from_row(&row)
            .map_err(|e| map_sqlx_error("get_run_by_id", e))?
            .try_into()
    }
}

#[async_trait]
impl RunStatusWriter for PostgresRunStore {
    #[instrument(skip(self, error_message), fields(run_id = %run_id, status = %status), err)]
    async fn update_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), TailorError> {
        let run_id = run_id.require()?;
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2,
                error_message = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(status.as_str())
        .bind(error_message)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_run_status", e))?;

        if result.rows_affected() == 0 {
            return Err(TailorError::not_found(format!("run {run_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RunRepository for PostgresRunStore {
    #[instrument(skip(self, job_text), fields(user_id = %user_id, resume_id = %resume_id), err)]
    async fn create_run(
        &self,
        user_id: UserId,
        resume_id: ResumeId,
        job_text: &str,
    ) -> Result<Run, TailorError> {
        let (user_id, resume_id, job_text) = validate_new_run(user_id, resume_id, job_text)?;
        let run = Run::new(user_id, resume_id, job_text);

        sqlx::query(
            r#"
            INSERT INTO runs (id, user_id, resume_id, job_text, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.user_id.as_uuid())
        .bind(run.resume_id.as_uuid())
        .bind(&run.job_text)
        .bind(run.status.as_str())
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_run", e))?;

        Ok(run)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_runs_by_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Run>, TailorError> {
        let user_id = user_id.require()?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM runs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(i64::from(page_limit(limit)))
        .bind(i64::from(offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_runs_by_user", e))?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let run: Run = RunRow::from_row(&row)
                .map_err(|e| map_sqlx_error("list_runs_by_user", e))?
                .try_into()?;
            runs.push(run);
        }
        Ok(runs)
    }
}

// SQLx row types

#[derive(Debug)]
struct RunRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    resume_id: uuid::Uuid,
    job_text: String,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for RunRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(RunRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            resume_id: row.try_get("resume_id")?,
            job_text: row.try_get("job_text")?,
            status: row.try_get("status")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<RunRow> for Run {
    type Error = TailorError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RunStatus>()
            .map_err(|e| TailorError::persistence(format!("corrupt run row {}: {e}", row.id)))?;
        Ok(Run {
            id: RunId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            resume_id: ResumeId::from_uuid(row.resume_id),
            job_text: row.job_text,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
