//! Error and outcome types for the self-healing pipeline.

use shared_types::{Rejection, UpdateFailure};
use thiserror::Error;

/// Self-healing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealingError {
    #[error("Invalid issue: {0}")]
    InvalidIssue(String),

    #[error("Envelope {0} is not a fix")]
    NotAFix(String),

    #[error("Fix payload unavailable: {0}")]
    PayloadUnavailable(String),

    #[error("Fix payload corrupt: {0}")]
    Corrupt(String),

    #[error("Fix payload malformed: {0}")]
    Malformed(String),

    #[error("Untrusted fix: {0}")]
    Untrusted(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl HealingError {
    /// Failure class of a peer fix that could not be taken in. `None` for
    /// errors that say nothing about the peer's fix.
    pub fn rejection(&self) -> Option<Rejection> {
        let failure = match self {
            HealingError::PayloadUnavailable(_) => UpdateFailure::FetchFailed,
            HealingError::Corrupt(_) | HealingError::Malformed(_) => UpdateFailure::Corrupt,
            HealingError::Untrusted(_) => UpdateFailure::Untrusted,
            HealingError::InvalidIssue(_) | HealingError::NotAFix(_) | HealingError::Signing(_) => {
                return None
            }
        };
        Some(Rejection::new(failure, self.to_string()))
    }
}

/// What happened to a fix received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingFixOutcome {
    Applied { fix_id: String },
    /// Published as `OperatorActionRequired`.
    AwaitingOperator { fix_id: String },
    Rejected { fix_id: String, reason: String },
    /// This envelope or fix was handled before.
    Duplicate,
}
