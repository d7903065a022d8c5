use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use tailor_core::{ResumeId, Run, RunId, RunStatus, TailorError, UserId};

use super::{page_limit, validate_new_run, RunLookup, RunRepository, RunStatusWriter};

/// In-memory run store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<RunId, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a run as-is.
    pub fn insert(&self, run: Run) -> Result<(), TailorError> {
        self.runs
            .write()
            .map_err(|_| TailorError::persistence("run store lock poisoned"))?
            .insert(run.id, run);
        Ok(())
    }
}

#[async_trait]
impl RunLookup for InMemoryRunStore {
    async fn get_run_by_id(&self, run_id: RunId) -> Result<Run, TailorError> {
        let run_id = run_id.require()?;
        self.runs
            .read()
            .map_err(|_| TailorError::persistence("run store lock poisoned"))?
            .get(&run_id)
            .cloned()
            .ok_or_else(|| TailorError::not_found(format!("run {run_id}")))
    }
}

#[async_trait]
impl RunStatusWriter for InMemoryRunStore {
    async fn update_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), TailorError> {
        let run_id = run_id.require()?;
        let mut runs = self
            .runs
            .write()
            .map_err(|_| TailorError::persistence("run store lock poisoned"))?;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| TailorError::not_found(format!("run {run_id}")))?;
        run.status = status;
        run.error_message = error_message.map(str::to_string);
        run.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RunRepository for InMemoryRunStore {
    async fn create_run(
        &self,
        user_id: UserId,
        resume_id: ResumeId,
        job_text: &str,
    ) -> Result<Run, TailorError> {
        let (user_id, resume_id, job_text) = validate_new_run(user_id, resume_id, job_text)?;
        let run = Run::new(user_id, resume_id, job_text);
        self.insert(run.clone())?;
        Ok(run)
    }

    async fn list_runs_by_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Run>, TailorError> {
        let user_id = user_id.require()?;
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .map_err(|_| TailorError::persistence("run store lock poisoned"))?
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();

        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(runs
            .into_iter()
            .skip(offset as usize)
            .take(page_limit(limit) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get() {
        let store = InMemoryRunStore::new();
        let run = store
            .create_run(UserId::new(), ResumeId::new(), "  Senior Rust engineer ")
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Created);
        assert_eq!(run.job_text, "Senior Rust engineer");

        let loaded = store.get_run_by_id(run.id).await.unwrap();
        assert_eq!(loaded, run);
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let store = InMemoryRunStore::new();
        assert!(matches!(
            store.get_run_by_id(RunId::new()).await,
            Err(TailorError::NotFound(_))
        ));
        assert!(matches!(
            store.update_status(RunId::new(), RunStatus::Processing, None).await,
            Err(TailorError::NotFound(_))
        ));
        assert!(matches!(
            store.get_run_by_id(RunId::nil()).await,
            Err(TailorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn update_status_overwrites_error_message() {
        let store = InMemoryRunStore::new();
        let run = store.create_run(UserId::new(), ResumeId::new(), "job").await.unwrap();

        store.update_status(run.id, RunStatus::Failed, Some("boom")).await.unwrap();
        let failed = store.get_run_by_id(run.id).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        store.update_status(run.id, RunStatus::Completed, None).await.unwrap();
        let completed = store.get_run_by_id(run.id).await.unwrap();
        assert_eq!(completed.status, RunStatus::Completed);
        assert!(completed.error_message.is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_user_and_paged() {
        let store = InMemoryRunStore::new();
        let user = UserId::new();
        for i in 0..5 {
            store.create_run(user, ResumeId::new(), &format!("job {i}")).await.unwrap();
        }
        store.create_run(UserId::new(), ResumeId::new(), "other").await.unwrap();

        assert_eq!(store.list_runs_by_user(user, 0, 0).await.unwrap().len(), 5);
        assert_eq!(store.list_runs_by_user(user, 2, 0).await.unwrap().len(), 2);
        assert_eq!(store.list_runs_by_user(user, 10, 4).await.unwrap().len(), 1);
    }
}
