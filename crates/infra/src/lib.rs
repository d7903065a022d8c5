//! Infrastructure layer: queue, run lifecycle, pipeline, worker, storage.

pub mod config;
pub mod db;
pub mod jobs;
pub mod pipeline;
pub mod reports;
pub mod resumes;
pub mod runs;
pub mod submission;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, GeneratorConfig, WorkerConfig};
pub use jobs::{
    InMemoryJobStore, Job, JobKind, JobStats, JobStatus, JobStore, PostgresJobStore, RetryPolicy,
};
pub use pipeline::ReportPipeline;
pub use reports::{InMemoryReportStore, PostgresReportStore, ReportStore};
pub use resumes::{InMemoryResumeStore, PostgresResumeStore, ResumeLookup};
pub use runs::{
    InMemoryRunStore, PostgresRunStore, RunLookup, RunRepository, RunStateTracker, RunStatusWriter,
};
pub use submission::RunSubmission;
pub use worker::{CycleOutcome, Disposition, TickSchedule, Worker};
