//! Resume lookup for the pipeline and the submission path.

pub mod postgres;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tailor_core::{Resume, ResumeId, TailorError, UserId};

pub use postgres::PostgresResumeStore;

#[async_trait]
pub trait ResumeLookup: Send + Sync + 'static {
    async fn get_resume_by_id(&self, resume_id: ResumeId) -> Result<Resume, TailorError>;
}

pub(crate) fn validate_new_resume(
    user_id: UserId,
    title: &str,
    content_text: &str,
) -> Result<(UserId, String, String), TailorError> {
    let user_id = user_id.require()?;
    let title = title.trim();
    if title.is_empty() {
        return Err(TailorError::invalid_input("title must not be blank"));
    }
    if content_text.trim().is_empty() {
        return Err(TailorError::invalid_input("content_text must not be blank"));
    }
    Ok((user_id, title.to_string(), content_text.to_string()))
}

/// In-memory resume store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryResumeStore {
    resumes: RwLock<HashMap<ResumeId, Resume>>,
}

impl InMemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_resume(
        &self,
        user_id: UserId,
        title: &str,
        content_text: &str,
    ) -> Result<Resume, TailorError> {
        let (user_id, title, content_text) = validate_new_resume(user_id, title, content_text)?;
        let resume = Resume::new(user_id, title, content_text);
        self.resumes
            .write()
            .map_err(|_| TailorError::persistence("resume store lock poisoned"))?
            .insert(resume.id, resume.clone());
        Ok(resume)
    }
}

#[async_trait]
impl ResumeLookup for InMemoryResumeStore {
    async fn get_resume_by_id(&self, resume_id: ResumeId) -> Result<Resume, TailorError> {
        let resume_id = resume_id.require()?;
        self.resumes
            .read()
            .map_err(|_| TailorError::persistence("resume store lock poisoned"))?
            .get(&resume_id)
            .cloned()
            .ok_or_else(|| TailorError::not_found(format!("resume {resume_id}")))
    }
}
