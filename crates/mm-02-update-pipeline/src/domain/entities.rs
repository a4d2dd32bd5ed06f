//! Pipeline entities: per-envelope state and results.

use std::fmt;

use shared_types::{SandboxTestResult, UpdateCategory, UpdateFailure};

/// A non-terminal pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Verifying,
    Downloading,
    HashChecking,
    SandboxTesting,
    Applying,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Verifying => "verifying",
            Stage::Downloading => "downloading",
            Stage::HashChecking => "hash-checking",
            Stage::SandboxTesting => "sandbox-testing",
            Stage::Applying => "applying",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an envelope is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    InProgress(Stage),
    Applied,
    Rejected(Stage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineState::InProgress(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::InProgress(stage) => write!(f, "{}", stage),
            PipelineState::Applied => f.write_str("applied"),
            PipelineState::Rejected(stage) => write!(f, "rejected-at-{}", stage),
        }
    }
}

/// The update currently installed for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    pub envelope_id: String,
    pub version: String,
    pub applied_at: u64,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub envelope_id: String,
    pub category: UpdateCategory,
    pub version: String,
    pub payload_size_bytes: u64,
    pub sandbox: SandboxTestResult,
}

/// Pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub applied: u64,
    pub rejected_stale: u64,
    pub rejected_untrusted: u64,
    pub rejected_corrupt: u64,
    pub rejected_unsafe: u64,
    pub fetch_failed: u64,
    pub apply_failed: u64,
    pub in_flight: usize,
}

impl PipelineStats {
    pub fn record_failure(&mut self, failure: UpdateFailure) {
        let counter = match failure {
            UpdateFailure::Stale => &mut self.rejected_stale,
            UpdateFailure::Untrusted => &mut self.rejected_untrusted,
            UpdateFailure::Corrupt => &mut self.rejected_corrupt,
            UpdateFailure::Unsafe => &mut self.rejected_unsafe,
            UpdateFailure::FetchFailed => &mut self.fetch_failed,
            UpdateFailure::ApplyFailed => &mut self.apply_failed,
        };
        *counter += 1;
    }

    pub fn total_failures(&self) -> u64 {
        self.rejected_stale
            + self.rejected_untrusted
            + self.rejected_corrupt
            + self.rejected_unsafe
            + self.fetch_failed
            + self.apply_failed
    }
}
