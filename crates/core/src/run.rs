//! Runs: a user's request for resume-versus-job analysis and its outcome.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TailorError;
use crate::id::{ResumeId, RunId, UserId};

/// User-visible lifecycle status of a run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Created,
        RunStatus::Queued,
        RunStatus::Processing,
        RunStatus::Completed,
        RunStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Queued => "queued",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// `Failed` is terminal only for the current attempt; a requeued job
    /// moves the run back to `Processing` when it is claimed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = TailorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TailorError::invalid_input(format!("unknown run status: {s}")))
    }
}

/// A submitted analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub user_id: UserId,
    pub resume_id: ResumeId,
    pub job_text: String,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// A fresh run in `Created` status.
    pub fn new(user_id: UserId, resume_id: ResumeId, job_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            user_id,
            resume_id,
            job_text: job_text.into(),
            status: RunStatus::Created,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
