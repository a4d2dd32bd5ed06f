//! # Error Types
//!
//! Defines the failure taxonomy and port errors used across subsystems.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an update was not applied.
///
/// Every rejection anywhere in the mesh maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateFailure {
    /// Outside the freshness window (too old or too far in the future).
    Stale,
    /// Origin not trusted, or signature missing or invalid.
    Untrusted,
    /// Payload hash mismatch, malformed fields, or size out of bounds.
    Corrupt,
    /// A sandbox test failed.
    Unsafe,
    /// Payload could not be retrieved.
    FetchFailed,
    /// The category applier failed.
    ApplyFailed,
}

impl UpdateFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateFailure::Stale => "stale",
            UpdateFailure::Untrusted => "untrusted",
            UpdateFailure::Corrupt => "corrupt",
            UpdateFailure::Unsafe => "unsafe",
            UpdateFailure::FetchFailed => "fetch-failed",
            UpdateFailure::ApplyFailed => "apply-failed",
        }
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified rejection with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{failure}: {detail}")]
pub struct Rejection {
    pub failure: UpdateFailure,
    pub detail: String,
}

impl Rejection {
    pub fn new(failure: UpdateFailure, detail: impl Into<String>) -> Self {
        Self {
            failure,
            detail: detail.into(),
        }
    }
}

/// Errors from a content store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid content key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

/// Errors from a mesh transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Payload unavailable: {0}")]
    PayloadUnavailable(String),

    #[error("Wire codec error: {0}")]
    Codec(String),

    #[error("Transport closed")]
    Closed,
}
