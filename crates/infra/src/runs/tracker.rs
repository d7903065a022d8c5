//! Run state tracker: the user-visible side of queue outcomes.
//!
//! A pure status/error mutation. It never decides retry eligibility; the
//! worker reconciles the job after each transition.

use std::sync::Arc;

use tracing::debug;

use tailor_core::{RunId, RunStatus, TailorError};

use super::RunStatusWriter;

#[derive(Clone)]
pub struct RunStateTracker {
    writer: Arc<dyn RunStatusWriter>,
}

impl RunStateTracker {
    pub fn new(writer: Arc<dyn RunStatusWriter>) -> Self {
        Self { writer }
    }

    pub async fn set_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), TailorError> {
        self.writer.update_status(run_id, status, error_message).await?;
        debug!(run_id = %run_id, status = %status, "run status updated");
        Ok(())
    }

    /// After a successful claim.
    pub async fn mark_processing(&self, run_id: RunId) -> Result<(), TailorError> {
        self.set_status(run_id, RunStatus::Processing, None).await
    }

    /// After pipeline success. Clears any error left by an earlier attempt.
    pub async fn mark_completed(&self, run_id: RunId) -> Result<(), TailorError> {
        self.set_status(run_id, RunStatus::Completed, None).await
    }

    pub async fn mark_failed(&self, run_id: RunId, error: &str) -> Result<(), TailorError> {
        self.set_status(run_id, RunStatus::Failed, Some(error)).await
    }
}

impl std::fmt::Debug for RunStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStateTracker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::{InMemoryRunStore, RunLookup, RunRepository};
    use tailor_core::{ResumeId, UserId};

    #[tokio::test]
    async fn transitions_are_persisted() {
        let store = Arc::new(InMemoryRunStore::new());
        let tracker = RunStateTracker::new(store.clone());
        let run = store.create_run(UserId::new(), ResumeId::new(), "job").await.unwrap();

        tracker.mark_processing(run.id).await.unwrap();
        assert_eq!(store.get_run_by_id(run.id).await.unwrap().status, RunStatus::Processing);

        tracker.mark_failed(run.id, "upstream failure: 503").await.unwrap();
        let failed = store.get_run_by_id(run.id).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("upstream failure: 503"));

        tracker.mark_completed(run.id).await.unwrap();
        let completed = store.get_run_by_id(run.id).await.unwrap();
        assert_eq!(completed.status, RunStatus::Completed);
        assert_eq!(completed.error_message, None);
    }

    #[tokio::test]
    async fn missing_run_surfaces_not_found() {
        let tracker = RunStateTracker::new(Arc::new(InMemoryRunStore::new()));
        assert!(matches!(
            tracker.mark_processing(RunId::new()).await,
            Err(TailorError::NotFound(_))
        ));
    }
}
