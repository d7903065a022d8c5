use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use tailor_core::{Resume, ResumeId, TailorError, UserId};

use super::{validate_new_resume, ResumeLookup};
use crate::db::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresResumeStore {
    pool: Arc<PgPool>,
}

impl PostgresResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, title, content_text), fields(user_id = %user_id), err)]
    pub async fn create_resume(
        &self,
        user_id: UserId,
        title: &str,
        content_text: &str,
    ) -> Result<Resume, TailorError> {
        let (user_id, title, content_text) = validate_new_resume(user_id, title, content_text)?;
        let resume = Resume::new(user_id, title, content_text);

        sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, title, content_text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(resume.id.as_uuid())
        .bind(resume.user_id.as_uuid())
        .bind(&resume.title)
        .bind(&resume.content_text)
        .bind(resume.created_at)
        .bind(resume.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_resume", e))?;

        Ok(resume)
    }
}

#[async_trait]
impl ResumeLookup for PostgresResumeStore {
    #[instrument(skip(self), fields(resume_id = %resume_id), err)]
    async fn get_resume_by_id(&self, resume_id: ResumeId) -> Result<Resume, TailorError> {
        let resume_id = resume_id.require()?;
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, content_text, created_at, updated_at
            FROM resumes
            WHERE id = $1
            "#,
        )
        .bind(resume_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_resume_by_id", e))?
        .ok_or_else(|| TailorError::not_found(format!("resume {resume_id}")))?;

        let row = ResumeRow::from_row(&row).map_err(|e| map_sqlx_error("get_resume_by_id", e))?;
        Ok(row.into())
    }
}

// SQLx row types

#[derive(Debug)]
struct ResumeRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    title: String,
    content_text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ResumeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ResumeRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            content_text: row.try_get("content_text")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ResumeRow> for Resume {
    fn from(row: ResumeRow) -> Self {
        Resume {
            id: ResumeId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            title: row.title,
            content_text: row.content_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
