//! `tailor-core`: shared records, identifiers and the error taxonomy.
//!
//! This crate contains **no I/O**. Stores, the worker and the AI boundary
//! all speak in these types.

pub mod error;
pub mod id;
pub mod report;
pub mod resume;
pub mod run;

pub use error::TailorError;
pub use id::{JobId, ResumeId, RunId, UserId};
pub use report::{ResumeArtifact, RunReport};
pub use resume::Resume;
pub use run::{Run, RunStatus};
