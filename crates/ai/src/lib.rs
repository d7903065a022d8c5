//! `tailor-ai`
//!
//! **Responsibility:** boundary to the text-analysis collaborators.
//!
//! - [`Scorer`]: best-effort lexical match signals between resume and job text.
//! - [`ReportGenerator`]: the networked report generator (score, notes, changes).
//!
//! Nothing here touches storage; the pipeline in `tailor-infra` persists
//! whatever these produce.

pub mod generator;
pub mod openai;
pub mod prompt;
pub mod result;
pub mod scorer;

pub use generator::{ReportGenerator, UnconfiguredGenerator};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use result::{AiError, ChangePlan, GeneratedReport, ScoreReport};
pub use scorer::{Bm25Scorer, ScoreError, Scorer, Signals};
