use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use tailor_core::{ResumeArtifact, RunId, RunReport, TailorError};

use super::ReportStore;
use crate::db::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresReportStore {
    pool: Arc<PgPool>,
}

impl PostgresReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ReportStore for PostgresReportStore {
    #[instrument(skip(self, ats_report, change_plan), fields(run_id = %run_id), err)]
    async fn upsert_report(
        &self,
        run_id: RunId,
        ats_report: JsonValue,
        change_plan: JsonValue,
    ) -> Result<(), TailorError> {
        let run_id = run_id.require()?;
        sqlx::query(
            r#"
            INSERT INTO run_reports (run_id, ats_report, change_plan)
            VALUES ($1, $2, $3)
            ON CONFLICT (run_id) DO UPDATE
            SET ats_report = EXCLUDED.ats_report,
                change_plan = EXCLUDED.change_plan,
                created_at = now()
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(ats_report)
        .bind(change_plan)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_report", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(run_id = %run_id), err)]
    async fn get_report_by_run_id(&self, run_id: RunId) -> Result<RunReport, TailorError> {
        let run_id = run_id.require()?;
        let row = sqlx::query(
            r#"
            SELECT run_id, ats_report, change_plan, created_at
            FROM run_reports
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_report_by_run_id", e))?
        .ok_or_else(|| TailorError::not_found(format!("report for run {run_id}")))?;

        let row = ReportRow::from_row(&row).map_err(|e| map_sqlx_error("get_report_by_run_id", e))?;
        Ok(row.into())
    }

    #[instrument(skip(self, artifact), fields(run_id = %artifact.run_id), err)]
    async fn upsert_artifact(&self, artifact: &ResumeArtifact) -> Result<(), TailorError> {
        let run_id = artifact.run_id.require()?;
        sqlx::query(
            r#"
            INSERT INTO run_artifacts (run_id, resume_spec, latex_path, pdf_path)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (run_id) DO UPDATE
            SET resume_spec = EXCLUDED.resume_spec,
                latex_path = EXCLUDED.latex_path,
                pdf_path = EXCLUDED.pdf_path,
                created_at = now()
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(&artifact.resume_spec)
        .bind(&artifact.latex_path)
        .bind(&artifact.pdf_path)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_artifact", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(run_id = %run_id), err)]
    async fn get_artifact_by_run_id(&self, run_id: RunId) -> Result<ResumeArtifact, TailorError> {
        let run_id = run_id.require()?;
        let row = sqlx::query(
            r#"
            SELECT run_id, resume_spec, latex_path, pdf_path, created_at
            FROM run_artifacts
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_artifact_by_run_id", e))?
        .ok_or_else(|| TailorError::not_found(format!("artifact for run {run_id}")))?;

        let row = ArtifactRow::from_row(&row)
            .map_err(|e| map_sqlx_error("get_artifact_by_run_id", e))?;
        Ok(row.into())
    }
}

// SQLx row types

#[derive(Debug)]
struct ReportRow {
    run_id: uuid::Uuid,
    ats_report: JsonValue,
    change_plan: JsonValue,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ReportRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReportRow {
            run_id: row.try_get("run_id")?,
            ats_report: row.try_get("ats_report")?,
            change_plan: row.try_get("change_plan")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<ReportRow> for RunReport {
    fn from(row: ReportRow) -> Self {
        RunReport {
            run_id: RunId::from_uuid(row.run_id),
            ats_report: row.ats_report,
            change_plan: row.change_plan,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct ArtifactRow {
    run_id: uuid::Uuid,
    resume_spec: JsonValue,
    latex_path: String,
    pdf_path: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ArtifactRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ArtifactRow {
            run_id: row.try_get("run_id")?,
            resume_spec: row.try_get("resume_spec")?,
            latex_path: row.try_get("latex_path")?,
            pdf_path: row.try_get("pdf_path")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<ArtifactRow> for ResumeArtifact {
    fn from(row: ArtifactRow) -> Self {
        ResumeArtifact {
            run_id: RunId::from_uuid(row.run_id),
            resume_spec: row.resume_spec,
            latex_path: row.latex_path,
            pdf_path: row.pdf_path,
            created_at: row.created_at,
        }
    }
}
