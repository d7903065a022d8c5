use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tailor_core::TailorError;

/// ATS compatibility score with the reasoning behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Compatibility in \[0, 1\].
    pub score: f64,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Recommended resume changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePlan {
    #[serde(default)]
    pub changes: Vec<String>,
}

/// Everything one generation call produces.
///
/// Field names match the JSON object the generator is asked to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub ats_report: ScoreReport,
    #[serde(default)]
    pub change_plan: ChangePlan,
}

impl GeneratedReport {
    /// Reject scores outside \[0, 1\] (NaN included).
    pub fn validate(&self) -> Result<(), AiError> {
        let score = self.ats_report.score;
        if !(0.0..=1.0).contains(&score) {
            return Err(AiError::InvalidResponse(format!(
                "ats score must be between 0 and 1, got {score}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("report generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<AiError> for TailorError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::InvalidResponse(msg) => TailorError::InvalidUpstreamResponse(msg),
            other => TailorError::UpstreamFailure(other.to_string()),
        }
    }
}
