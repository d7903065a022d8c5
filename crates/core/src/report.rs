//! Per-run outputs: the analysis report and the resume artifact record.
//!
//! Both are keyed 1:1 by run and upserted: a second write replaces the
//! payloads and the creation timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::RunId;

/// Persisted analysis output for a run.
///
/// Payloads are opaque to the stores; the pipeline decides their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Score and notes block.
    pub ats_report: JsonValue,
    /// Recommended changes block.
    pub change_plan: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Placeholder record for the tailored resume a run will eventually render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeArtifact {
    pub run_id: RunId,
    pub resume_spec: JsonValue,
    pub latex_path: String,
    pub pdf_path: String,
    pub created_at: DateTime<Utc>,
}

impl ResumeArtifact {
    pub const SPEC_VERSION: &'static str = "1.0";

    /// Stub content plus the file paths derived from the run id.
    pub fn placeholder(run_id: RunId, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            resume_spec: serde_json::json!({
                "version": Self::SPEC_VERSION,
                "sections": ["placeholder section"],
                "timestamp": now.timestamp(),
            }),
            latex_path: format!("/generated/{run_id}/resume.tex"),
            pdf_path: format!("/generated/{run_id}/resume.pdf"),
            created_at: now,
        }
    }
}
