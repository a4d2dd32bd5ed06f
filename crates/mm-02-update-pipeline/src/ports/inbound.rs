//! Inbound ports (API) for the update pipeline.

use async_trait::async_trait;
use shared_types::{UpdateCategory, UpdateEnvelope};

use crate::domain::{AppliedRecord, PipelineState, PipelineStats, VerificationLevel};
use crate::events::{PipelineError, PipelineOutcome};

/// Primary API for the verification and application pipeline.
#[async_trait]
pub trait UpdatePipelineApi: Send + Sync {
    /// Runs every stage for one envelope.
    ///
    /// Stages run in order and the first failure ends the run. Success and
    /// failure are both published on the event bus.
    async fn process(&self, envelope: UpdateEnvelope) -> PipelineOutcome;

    /// Freshness, origin policy and signature, without touching the payload.
    fn check_integrity(&self, envelope: &UpdateEnvelope, level: VerificationLevel) -> Result<(), PipelineError>;

    fn state_of(&self, envelope_id: &str) -> Option<PipelineState>;

    /// The update currently installed for `category`.
    fn applied(&self, category: UpdateCategory) -> Option<AppliedRecord>;

    /// Restores the category state replaced by the last installation.
    async fn rollback(&self, category: UpdateCategory) -> Result<(), PipelineError>;

    fn stats(&self) -> PipelineStats;
}
