//! Report pipeline: turns one run into a persisted report.
//!
//! Steps, in order:
//! 1. load the run and its resume (`NotFound` aborts)
//! 2. compute lexical signals (best-effort; failures are logged and dropped)
//! 3. generate the report under a deadline and validate its score
//! 4. upsert the report
//! 5. upsert the placeholder resume artifact
//!
//! Any failure other than step 2 aborts the run with that error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use tailor_ai::{ReportGenerator, Scorer};
use tailor_core::{ResumeArtifact, RunId, TailorError};

use crate::reports::ReportStore;
use crate::resumes::ResumeLookup;
use crate::runs::RunLookup;

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ReportPipeline {
    runs: Arc<dyn RunLookup>,
    resumes: Arc<dyn ResumeLookup>,
    reports: Arc<dyn ReportStore>,
    scorer: Arc<dyn Scorer>,
    generator: Arc<dyn ReportGenerator>,
    generation_timeout: Duration,
}

impl ReportPipeline {
    pub fn new(
        runs: Arc<dyn RunLookup>,
        resumes: Arc<dyn ResumeLookup>,
        reports: Arc<dyn ReportStore>,
        scorer: Arc<dyn Scorer>,
        generator: Arc<dyn ReportGenerator>,
    ) -> Self {
        Self {
            runs,
            resumes,
            reports,
            scorer,
            generator,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn process(&self, run_id: RunId) -> Result<(), TailorError> {
        let run = self.runs.get_run_by_id(run_id).await?;
        let resume = self.resumes.get_resume_by_id(run.resume_id).await?;

        let signals = match self.scorer.compute(&resume.content_text, &run.job_text) {
            Ok(signals) => Some(signals),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "scoring failed, continuing without signals");
                None
            }
        };

        let generated = tokio::time::timeout(
            self.generation_timeout,
            self.generator
                .generate(&resume.content_text, &run.job_text, signals.as_ref()),
        )
        .await
        .map_err(|_| {
            TailorError::upstream(format!(
                "report generation timed out after {:?}",
                self.generation_timeout
            ))
        })??;
        generated.validate()?;

        let ats_report = serde_json::to_value(&generated.ats_report).map_err(|e| {
            TailorError::invalid_upstream_response(format!("unserializable ats report: {e}"))
        })?;
        let change_plan = serde_json::to_value(&generated.change_plan).map_err(|e| {
            TailorError::invalid_upstream_response(format!("unserializable change plan: {e}"))
        })?;
        self.reports.upsert_report(run_id, ats_report, change_plan).await?;

        let artifact = ResumeArtifact::placeholder(run_id, Utc::now());
        self.reports.upsert_artifact(&artifact).await?;

        debug!(
            run_id = %run_id,
            score = generated.ats_report.score,
            with_signals = signals.is_some(),
            "report persisted"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("generation_timeout", &self.generation_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tailor_ai::UnconfiguredGenerator;
    use tailor_core::{ResumeId, UserId};

    use super::*;
    use crate::runs::RunRepository;
    use crate::testing::{FailingScorer, Fixture, HangingGenerator, StubGenerator};

    #[tokio::test]
    async fn persists_report_and_artifact() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        fx.pipeline(Arc::new(StubGenerator::ok(0.8))).process(run.id).await.unwrap();

        let report = fx.reports.get_report_by_run_id(run.id).await.unwrap();
        assert_eq!(report.ats_report["score"], 0.8);
        assert_eq!(report.change_plan["changes"][0], "mention terraform");

        let artifact = fx.reports.get_artifact_by_run_id(run.id).await.unwrap();
        assert_eq!(artifact.latex_path, format!("/generated/{}/resume.tex", run.id));
    }

    #[tokio::test]
    async fn scorer_failure_is_not_fatal() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        fx.pipeline_with(Arc::new(StubGenerator::ok(0.6)), Arc::new(FailingScorer))
            .process(run.id)
            .await
            .unwrap();

        assert!(fx.reports.get_report_by_run_id(run.id).await.is_ok());
    }

    #[tokio::test]
    async fn missing_run_or_resume_is_not_found() {
        let fx = Fixture::new(3);
        let generator = Arc::new(StubGenerator::ok(0.5));
        let pipeline = fx.pipeline(generator.clone());

        let err = pipeline.process(RunId::new()).await.unwrap_err();
        assert!(matches!(err, TailorError::NotFound(_)));

        let orphan = fx
            .runs
            .create_run(UserId::new(), ResumeId::new(), "job")
            .await
            .unwrap();
        let err = pipeline.process(orphan.id).await.unwrap_err();
        assert!(matches!(err, TailorError::NotFound(ref m) if m.contains("resume")));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn out_of_range_score_is_invalid_upstream_response() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        let err = fx
            .pipeline(Arc::new(StubGenerator::ok(1.5)))
            .process(run.id)
            .await
            .unwrap_err();

        assert!(matches!(err, TailorError::InvalidUpstreamResponse(_)));
        assert!(fx.reports.get_report_by_run_id(run.id).await.is_err());
    }

    #[tokio::test]
    async fn missing_credentials_fail_the_run_only() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        let err = fx
            .pipeline(Arc::new(UnconfiguredGenerator::new("OPENAI_API_KEY")))
            .process(run.id)
            .await
            .unwrap_err();

        assert!(matches!(err, TailorError::UpstreamFailure(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[tokio::test]
    async fn generation_is_bounded_by_deadline() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        let err = fx
            .pipeline(Arc::new(HangingGenerator))
            .with_generation_timeout(Duration::from_millis(50))
            .process(run.id)
            .await
            .unwrap_err();

        assert!(matches!(err, TailorError::UpstreamFailure(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn rerun_overwrites_previous_report() {
        let fx = Fixture::new(3);
        let run = fx.seed_run().await;

        fx.pipeline(Arc::new(StubGenerator::ok(0.3))).process(run.id).await.unwrap();
        fx.pipeline(Arc::new(StubGenerator::ok(0.9))).process(run.id).await.unwrap();

        assert_eq!(fx.reports.report_count(), 1);
        let report = fx.reports.get_report_by_run_id(run.id).await.unwrap();
        assert_eq!(report.ats_report["score"], 0.9);
    }
}
