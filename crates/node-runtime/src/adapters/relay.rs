//! # Relay Verifiers
//!
//! Bridges the dissemination engine's per-category verifier table to the
//! subsystems that own the checks. Relaying needs integrity only; the full
//! pipeline runs later, before anything is applied.

use std::sync::Arc;

use async_trait::async_trait;
use mm_01_dissemination::EnvelopeVerifier;
use mm_02_update_pipeline::{UpdatePipelineApi, VerificationLevel};
use mm_03_self_healing::SelfHealingApi;
use shared_types::{Rejection, UpdateEnvelope};

/// Ordinary updates: freshness (dissemination window), origin policy and
/// signature.
pub struct PipelineRelayVerifier {
    pipeline: Arc<dyn UpdatePipelineApi>,
}

impl PipelineRelayVerifier {
    pub fn new(pipeline: Arc<dyn UpdatePipelineApi>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl EnvelopeVerifier for PipelineRelayVerifier {
    async fn verify(&self, envelope: &UpdateEnvelope) -> Result<(), Rejection> {
        self.pipeline
            .check_integrity(envelope, VerificationLevel::Dissemination)
            .map_err(|e| e.to_rejection())
    }
}

/// Fix envelopes.
pub struct HealingRelayVerifier {
    healing: Arc<dyn SelfHealingApi>,
}

impl HealingRelayVerifier {
    pub fn new(healing: Arc<dyn SelfHealingApi>) -> Self {
        Self { healing }
    }
}

#[async_trait]
impl EnvelopeVerifier for HealingRelayVerifier {
    async fn verify(&self, envelope: &UpdateEnvelope) -> Result<(), Rejection> {
        self.healing.screen_envelope(envelope)
    }
}
