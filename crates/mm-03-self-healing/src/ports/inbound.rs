//! Inbound ports (API) for the self-healing pipeline.

use async_trait::async_trait;
use shared_types::{DetectedIssue, GeneratedFix, Rejection, UpdateEnvelope};

use crate::domain::HealingStats;
use crate::events::{HealingError, IncomingFixOutcome};

/// Primary API for self-healing.
#[async_trait]
pub trait SelfHealingApi: Send + Sync {
    /// Records an issue and, when a template matches or the pattern has
    /// repeated often enough, produces a fix.
    ///
    /// A returned fix has been signed and validated. `test_passed` tells
    /// whether it ran here; only fixes that ran are disseminated.
    async fn report_issue(&self, issue: DetectedIssue) -> Result<Option<GeneratedFix>, HealingError>;

    /// Loads, verifies, validates and possibly applies a fix received from
    /// a peer.
    async fn handle_incoming_fix(&self, envelope: UpdateEnvelope) -> Result<IncomingFixOutcome, HealingError>;

    /// Relay check for Fix-category envelopes: shape, freshness and origin
    /// signature.
    fn screen_envelope(&self, envelope: &UpdateEnvelope) -> Result<(), Rejection>;

    fn stats(&self) -> HealingStats;
}
