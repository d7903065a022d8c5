//! Error taxonomy shared by the queue, the run lifecycle and the pipeline.

use thiserror::Error;

/// Failure of a queue, run-lifecycle or pipeline operation.
///
/// `NoWorkAvailable` is a normal poll outcome, not a fault: the worker loop
/// swallows it and waits for the next tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TailorError {
    /// Malformed or nil identifiers; rejected before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced run, resume, job or report does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The queue holds no claimable job.
    #[error("no work available")]
    NoWorkAvailable,

    /// Network or generation failure in an upstream collaborator.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// The upstream answered, but with malformed or out-of-range content.
    #[error("invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),

    /// A store write or read failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl TailorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamFailure(msg.into())
    }

    pub fn invalid_upstream_response(msg: impl Into<String>) -> Self {
        Self::InvalidUpstreamResponse(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamFailure(_)
                | Self::InvalidUpstreamResponse(_)
                | Self::PersistenceFailure(_)
        )
    }

    pub fn is_no_work(&self) -> bool {
        matches!(self, Self::NoWorkAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TailorError::upstream("timeout").is_retryable());
        assert!(TailorError::invalid_upstream_response("score").is_retryable());
        assert!(TailorError::persistence("write").is_retryable());
        assert!(!TailorError::not_found("run").is_retryable());
        assert!(!TailorError::invalid_input("run_id").is_retryable());
        assert!(!TailorError::NoWorkAvailable.is_retryable());
        assert!(TailorError::NoWorkAvailable.is_no_work());
        assert!(!TailorError::not_found("job").is_no_work());
    }

    #[test]
    fn messages_carry_context() {
        assert_eq!(TailorError::not_found("run 42").to_string(), "not found: run 42");
        assert_eq!(TailorError::NoWorkAvailable.to_string(), "no work available");
    }
}
