//! Outcomes and error types for the dissemination subsystem.

use shared_types::{Rejection, StoreError};
use thiserror::Error;

/// Dissemination errors.
#[derive(Debug, Error)]
pub enum DisseminationError {
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Payload store failed: {0}")]
    Store(#[from] StoreError),
}

/// What happened to an envelope handed to `receive_envelope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// First sighting; published locally and forwarded to these peers.
    Accepted { forwarded_to: usize },
    /// Already in the seen set.
    Duplicate,
    /// Hop count at or beyond the limit.
    HopLimitReached { hop_count: u32, max_hops: u32 },
    /// Failed relay verification.
    Rejected(Rejection),
}

impl ReceiveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReceiveOutcome::Accepted { .. })
    }
}
