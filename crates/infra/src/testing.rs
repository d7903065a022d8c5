//! Shared test doubles for pipeline and worker tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tailor_ai::{
    AiError, Bm25Scorer, ChangePlan, GeneratedReport, ReportGenerator, ScoreError, ScoreReport,
    Scorer, Signals,
};
use tailor_core::{Run, RunId, RunStatus, TailorError, UserId};

use crate::jobs::InMemoryJobStore;
use crate::pipeline::ReportPipeline;
use crate::reports::InMemoryReportStore;
use crate::resumes::InMemoryResumeStore;
use crate::runs::{InMemoryRunStore, RunRepository, RunStatusWriter};

pub const RESUME_TEXT: &str =
    "Senior engineer building Rust services\nPostgres and Kafka in production";
pub const JOB_TEXT: &str = "Rust engineer with Postgres and Terraform";

/// Generator that fails its first `failures` calls, then returns `score`.
#[derive(Debug)]
pub struct StubGenerator {
    score: f64,
    failures: usize,
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn ok(score: f64) -> Self {
        Self::flaky(score, 0)
    }

    pub fn flaky(score: f64, failures: usize) -> Self {
        Self {
            score,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::flaky(0.5, usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportGenerator for StubGenerator {
    async fn generate(
        &self,
        _resume_text: &str,
        _job_text: &str,
        _signals: Option<&Signals>,
    ) -> Result<GeneratedReport, AiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(AiError::Status {
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        let report = GeneratedReport {
            ats_report: ScoreReport {
                score: self.score,
                notes: vec!["strong rust background".to_string()],
            },
            change_plan: ChangePlan {
                changes: vec!["mention terraform".to_string()],
            },
        };
        report.validate()?;
        Ok(report)
    }
}

/// Generator that never answers within any reasonable deadline.
#[derive(Debug)]
pub struct HangingGenerator;

#[async_trait]
impl ReportGenerator for HangingGenerator {
    async fn generate(
        &self,
        _resume_text: &str,
        _job_text: &str,
        _signals: Option<&Signals>,
    ) -> Result<GeneratedReport, AiError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AiError::Transport("unreachable".to_string()))
    }
}

#[derive(Debug)]
pub struct FailingScorer;

impl Scorer for FailingScorer {
    fn compute(&self, _resume_text: &str, _job_text: &str) -> Result<Signals, ScoreError> {
        Err(ScoreError::InvalidParameters("scorer exploded".to_string()))
    }
}

/// Status writer that rejects writes of selected statuses and delegates the rest.
pub struct SelectiveFailingWriter {
    inner: Arc<InMemoryRunStore>,
    reject: Vec<RunStatus>,
}

impl SelectiveFailingWriter {
    pub fn new(inner: Arc<InMemoryRunStore>, reject: Vec<RunStatus>) -> Self {
        Self { inner, reject }
    }
}

#[async_trait]
impl RunStatusWriter for SelectiveFailingWriter {
    async fn update_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), TailorError> {
        if self.reject.contains(&status) {
            return Err(TailorError::persistence(format!("cannot write status {status}")));
        }
        self.inner.update_status(run_id, status, error_message).await
    }
}

/// In-memory stores wired the way the worker binary wires Postgres ones.
pub struct Fixture {
    pub jobs: Arc<InMemoryJobStore>,
    pub runs: Arc<InMemoryRunStore>,
    pub resumes: Arc<InMemoryResumeStore>,
    pub reports: Arc<InMemoryReportStore>,
}

impl Fixture {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            jobs: Arc::new(InMemoryJobStore::new().with_max_attempts(max_attempts)),
            runs: Arc::new(InMemoryRunStore::new()),
            resumes: Arc::new(InMemoryResumeStore::new()),
            reports: Arc::new(InMemoryReportStore::new()),
        }
    }

    /// A resume plus a `created` run referencing it.
    pub async fn seed_run(&self) -> Run {
        let user = UserId::new();
        let resume = self.resumes.create_resume(user, "Backend", RESUME_TEXT).unwrap();
        self.runs.create_run(user, resume.id, JOB_TEXT).await.unwrap()
    }

    pub fn pipeline(&self, generator: Arc<dyn ReportGenerator>) -> ReportPipeline {
        self.pipeline_with(generator, Arc::new(Bm25Scorer::new()))
    }

    pub fn pipeline_with(
        &self,
        generator: Arc<dyn ReportGenerator>,
        scorer: Arc<dyn Scorer>,
    ) -> ReportPipeline {
        ReportPipeline::new(
            self.runs.clone(),
            self.resumes.clone(),
            self.reports.clone(),
            scorer,
            generator,
        )
    }
}
