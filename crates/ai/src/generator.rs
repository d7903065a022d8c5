use async_trait::async_trait;

use crate::result::{AiError, GeneratedReport};
use crate::scorer::Signals;

/// Produces the analysis report for one resume/job pair.
///
/// Implementations talk to the network; callers bound them with a deadline.
#[async_trait]
pub trait ReportGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        resume_text: &str,
        job_text: &str,
        signals: Option<&Signals>,
    ) -> Result<GeneratedReport, AiError>;
}

/// Stand-in used when no credentials are configured.
///
/// Every call fails with `MissingCredentials`, so the worker keeps running
/// and only the jobs that need generation fail.
#[derive(Debug, Clone)]
pub struct UnconfiguredGenerator {
    variable: &'static str,
}

impl UnconfiguredGenerator {
    pub fn new(variable: &'static str) -> Self {
        Self { variable }
    }
}

#[async_trait]
impl ReportGenerator for UnconfiguredGenerator {
    async fn generate(
        &self,
        _resume_text: &str,
        _job_text: &str,
        _signals: Option<&Signals>,
    ) -> Result<GeneratedReport, AiError> {
        Err(AiError::MissingCredentials(format!("{} is not set", self.variable)))
    }
}
