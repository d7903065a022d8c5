//! Run submission: the entry point that feeds the queue.

use std::sync::Arc;

use tracing::{error, info, instrument};

use tailor_core::{JobId, ResumeId, RunId, RunStatus, TailorError, UserId};

use crate::jobs::JobStore;
use crate::resumes::ResumeLookup;
use crate::runs::RunRepository;

/// Creates a run and enqueues exactly one job for it.
///
/// The run is marked `queued` before its job exists, so a worker that claims
/// the job immediately can only move the run forward. If the enqueue fails
/// the run is put back to `created`.
#[derive(Clone)]
pub struct RunSubmission {
    runs: Arc<dyn RunRepository>,
    resumes: Arc<dyn ResumeLookup>,
    jobs: Arc<dyn JobStore>,
}

impl RunSubmission {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        resumes: Arc<dyn ResumeLookup>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self { runs, resumes, jobs }
    }

    #[instrument(skip(self, job_text), fields(user_id = %user_id, resume_id = %resume_id), err)]
    pub async fn submit(
        &self,
        user_id: UserId,
        resume_id: ResumeId,
        job_text: &str,
    ) -> Result<(RunId, JobId), TailorError> {
        let user_id = user_id.require()?;
        let resume = self.resumes.get_resume_by_id(resume_id).await?;
        // Someone else's resume is reported exactly like a missing one.
        if resume.user_id != user_id {
            return Err(TailorError::not_found(format!("resume {resume_id}")));
        }

        let run = self.runs.create_run(user_id, resume.id, job_text).await?;
        self.runs.update_status(run.id, RunStatus::Queued, None).await?;

        let job_id = match self.jobs.enqueue(run.id).await {
            Ok(job_id) => job_id,
            Err(err) => {
                if let Err(rollback) =
                    self.runs.update_status(run.id, RunStatus::Created, None).await
                {
                    error!(
                        run_id = %run.id,
                        error = %rollback,
                        "failed to reset run after enqueue failure"
                    );
                }
                return Err(err);
            }
        };

        info!(run_id = %run.id, job_id = %job_id, "run submitted");
        Ok((run.id, job_id))
    }
}

impl std::fmt::Debug for RunSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSubmission").finish_non_exhaustive()
    }
}
