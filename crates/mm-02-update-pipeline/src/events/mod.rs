//! Error and outcome types for the update pipeline.

use shared_types::{Rejection, SandboxTestResult, StoreError, UpdateFailure};
use thiserror::Error;

use crate::domain::{PipelineReport, PipelineState, Stage};

/// Why an update was not installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Rejected (stale): {0}")]
    RejectedStale(String),

    #[error("Rejected (untrusted): {0}")]
    RejectedUntrusted(String),

    #[error("Rejected (corrupt): {0}")]
    RejectedCorrupt(String),

    #[error("Rejected (unsafe): {test} failed: {reason}")]
    RejectedUnsafe { test: String, reason: String },

    #[error("Payload fetch failed: {0}")]
    FetchFailed(String),

    #[error("Apply failed: {0}")]
    ApplyFailed(String),
}

impl PipelineError {
    pub fn failure(&self) -> UpdateFailure {
        match self {
            PipelineError::RejectedStale(_) => UpdateFailure::Stale,
            PipelineError::RejectedUntrusted(_) => UpdateFailure::Untrusted,
            PipelineError::RejectedCorrupt(_) => UpdateFailure::Corrupt,
            PipelineError::RejectedUnsafe { .. } => UpdateFailure::Unsafe,
            PipelineError::FetchFailed(_) => UpdateFailure::FetchFailed,
            PipelineError::ApplyFailed(_) => UpdateFailure::ApplyFailed,
        }
    }

    fn detail(&self) -> String {
        match self {
            PipelineError::RejectedStale(d)
            | PipelineError::RejectedUntrusted(d)
            | PipelineError::RejectedCorrupt(d)
            | PipelineError::FetchFailed(d)
            | PipelineError::ApplyFailed(d) => d.clone(),
            PipelineError::RejectedUnsafe { test, reason } => format!("{}: {}", test, reason),
        }
    }

    /// The bus representation of this error.
    pub fn to_rejection(&self) -> Rejection {
        Rejection::new(self.failure(), self.detail())
    }
}

/// Category applier errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("No snapshot to roll back to")]
    NothingToRollBack,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of handing one envelope to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Applied(PipelineReport),
    Rejected {
        stage: Stage,
        error: PipelineError,
        /// Present when the battery ran.
        sandbox: Option<SandboxTestResult>,
    },
    /// The envelope is already in progress or installed.
    AlreadyHandled(PipelineState),
}

impl PipelineOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PipelineOutcome::Applied(_))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            PipelineOutcome::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_rejection_names_test() {
        let err = PipelineError::RejectedUnsafe {
            test: "malicious_pattern_scan".into(),
            reason: "matched \"eval(\"".into(),
        };
        let rejection = err.to_rejection();
        assert_eq!(rejection.failure, UpdateFailure::Unsafe);
        assert!(rejection.detail.starts_with("malicious_pattern_scan"));
    }
}
