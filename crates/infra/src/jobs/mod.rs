//! Durable work queue: enqueue, lock-and-skip claiming, completion handling.
//!
//! ## Design
//!
//! - One work type today (`process_run`), one job per run
//! - Claiming selects the oldest queued job and locks it for one worker;
//!   rows held by another claimer are skipped, never waited on
//! - `attempts` is bumped at claim time and never reset
//! - A failed attempt is requeued while `attempts < max_attempts`,
//!   otherwise the job is terminally `failed`
//!
//! ## Components
//!
//! - `Job`: the queued record and its status
//! - `JobStore`: persistence (in-memory or Postgres)
//! - `RetryPolicy`: requeue-versus-terminal decision

pub mod postgres;
pub mod store;
pub mod types;

pub use postgres::PostgresJobStore;
pub use store::{InMemoryJobStore, JobStore, LOCK_EXPIRED};
pub use types::{Job, JobKind, JobStats, JobStatus, RetryPolicy};
