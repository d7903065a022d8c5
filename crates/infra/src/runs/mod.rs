//! Run persistence and the run state tracker.
//!
//! The worker depends on two narrow capabilities, `RunLookup` and
//! `RunStatusWriter`. The submission path needs the wider `RunRepository`.

pub mod in_memory;
pub mod postgres;
pub mod tracker;

use async_trait::async_trait;

use tailor_core::{ResumeId, Run, RunId, RunStatus, TailorError, UserId};

pub use in_memory::InMemoryRunStore;
pub use postgres::PostgresRunStore;
pub use tracker::RunStateTracker;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[async_trait]
pub trait RunLookup: Send + Sync + 'static {
    async fn get_run_by_id(&self, run_id: RunId) -> Result<Run, TailorError>;
}

#[async_trait]
pub trait RunStatusWriter: Send + Sync + 'static {
    /// Overwrite status and error message. `NotFound` when the run does not exist.
    async fn update_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), TailorError>;
}

#[async_trait]
pub trait RunRepository: RunLookup + RunStatusWriter {
    /// Insert a run in `created` status.
    async fn create_run(
        &self,
        user_id: UserId,
        resume_id: ResumeId,
        job_text: &str,
    ) -> Result<Run, TailorError>;

    /// Newest first. `limit` 0 means the default page size; larger values are capped.
    async fn list_runs_by_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Run>, TailorError>;
}

/// Validate ids and trim the job description.
pub(crate) fn validate_new_run(
    user_id: UserId,
    resume_id: ResumeId,
    job_text: &str,
) -> Result<(UserId, ResumeId, String), TailorError> {
    let user_id = user_id.require()?;
    let resume_id = resume_id.require()?;
    let job_text = job_text.trim();
    if job_text.is_empty() {
        return Err(TailorError::invalid_input("job_text must not be blank"));
    }
    Ok((user_id, resume_id, job_text.to_string()))
}

pub(crate) fn page_limit(limit: u32) -> u32 {
    match limit {
        0 => DEFAULT_PAGE_LIMIT,
        n => n.min(MAX_PAGE_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_input_is_validated_and_trimmed() {
        let (_, _, text) =
            validate_new_run(UserId::new(), ResumeId::new(), "  rust dev \n").unwrap();
        assert_eq!(text, "rust dev");

        assert!(validate_new_run(UserId::nil(), ResumeId::new(), "x").is_err());
        assert!(validate_new_run(UserId::new(), ResumeId::nil(), "x").is_err());
        assert!(validate_new_run(UserId::new(), ResumeId::new(), " \t").is_err());
    }

    #[test]
    fn page_limit_defaults_and_caps() {
        assert_eq!(page_limit(0), 20);
        assert_eq!(page_limit(7), 7);
        assert_eq!(page_limit(500), 100);
    }
}
