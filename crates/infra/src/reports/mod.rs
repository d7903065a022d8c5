//! Per-run report and artifact persistence.
//!
//! Both records are upserted by run id: the last write replaces payloads and
//! `created_at`, and there is never more than one row per run.

pub mod postgres;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use tailor_core::{ResumeArtifact, RunId, RunReport, TailorError};

pub use postgres::PostgresReportStore;

#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    async fn upsert_report(
        &self,
        run_id: RunId,
        ats_report: JsonValue,
        change_plan: JsonValue,
    ) -> Result<(), TailorError>;

    async fn get_report_by_run_id(&self, run_id: RunId) -> Result<RunReport, TailorError>;

    async fn upsert_artifact(&self, artifact: &ResumeArtifact) -> Result<(), TailorError>;

    async fn get_artifact_by_run_id(&self, run_id: RunId) -> Result<ResumeArtifact, TailorError>;
}

/// In-memory report store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<RunId, RunReport>>,
    artifacts: RwLock<HashMap<RunId, ResumeArtifact>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.reports.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn upsert_report(
        &self,
        run_id: RunId,
        ats_report: JsonValue,
        change_plan: JsonValue,
    ) -> Result<(), TailorError> {
        let run_id = run_id.require()?;
        let report = RunReport {
            run_id,
            ats_report,
            change_plan,
            created_at: Utc::now(),
        };
        self.reports
            .write()
            .map_err(|_| TailorError::persistence("report store lock poisoned"))?
            .insert(run_id, report);
        Ok(())
    }

    async fn get_report_by_run_id(&self, run_id: RunId) -> Result<RunReport, TailorError> {
        let run_id = run_id.require()?;
        self.reports
            .read()
            .map_err(|_| TailorError::persistence("report store lock poisoned"))?
            .get(&run_id)
            .cloned()
            .ok_or_else(|| TailorError::not_found(format!("report for run {run_id}")))
    }

    async fn upsert_artifact(&self, artifact: &ResumeArtifact) -> Result<(), TailorError> {
        let run_id = artifact.run_id.require()?;
        self.artifacts
            .write()
            .map_err(|_| TailorError::persistence("report store lock poisoned"))?
            .insert(run_id, artifact.clone());
        Ok(())
    }

    async fn get_artifact_by_run_id(&self, run_id: RunId) -> Result<ResumeArtifact, TailorError> {
        let run_id = run_id.require()?;
        self.artifacts
            .read()
            .map_err(|_| TailorError::persistence("report store lock poisoned"))?
            .get(&run_id)
            .cloned()
            .ok_or_else(|| TailorError::not_found(format!("artifact for run {run_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn second_upsert_replaces_first() {
        let store = InMemoryReportStore::new();
        let run_id = RunId::new();

        store
            .upsert_report(run_id, json!({"score": 0.4}), json!({"changes": []}))
            .await
            .unwrap();
        let first = store.get_report_by_run_id(run_id).await.unwrap();

        store
            .upsert_report(run_id, json!({"score": 0.9}), json!({"changes": ["add k8s"]}))
            .await
            .unwrap();
        let second = store.get_report_by_run_id(run_id).await.unwrap();

        assert_eq!(store.report_count(), 1);
        assert_eq!(second.ats_report, json!({"score": 0.9}));
        assert_eq!(second.change_plan, json!({"changes": ["add k8s"]}));
        assert!(second.created_at >= first.created_at);
    }

    #[tokio::test]
    async fn missing_report_is_not_found() {
        let store = InMemoryReportStore::new();
        assert!(matches!(
            store.get_report_by_run_id(RunId::new()).await,
            Err(TailorError::NotFound(_))
        ));
        assert!(matches!(
            store.get_artifact_by_run_id(RunId::new()).await,
            Err(TailorError::NotFound(_))
        ));
        assert!(matches!(
            store.upsert_report(RunId::nil(), json!({}), json!({})).await,
            Err(TailorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn artifact_upsert_is_keyed_by_run() {
        let store = InMemoryReportStore::new();
        let run_id = RunId::new();
        let artifact = ResumeArtifact::placeholder(run_id, Utc::now());

        store.upsert_artifact(&artifact).await.unwrap();
        store.upsert_artifact(&artifact).await.unwrap();

        let loaded = store.get_artifact_by_run_id(run_id).await.unwrap();
        assert_eq!(loaded, artifact);
    }
}
