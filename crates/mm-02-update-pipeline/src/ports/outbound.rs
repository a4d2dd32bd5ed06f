//! Outbound ports (SPI) for the update pipeline.
//!
//! Fetching, signature checks and persistence are implemented by adapters in
//! node-runtime. Category appliers ship with this crate under `adapters`.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::EventPublisher;
use shared_types::{ContentStore, NodeId, PayloadFetcher, TimeSource, UpdateCategory, UpdateEnvelope};

use crate::events::ApplyError;

/// Checks a signature against the key registered for `origin`.
pub trait OriginVerifier: Send + Sync {
    fn verify(&self, origin: &NodeId, message: &[u8], signature: &[u8]) -> Result<(), String>;
}

/// Installs payloads of one category.
///
/// Implementations must leave their state unchanged when `apply` fails, and
/// keep one snapshot of the replaced state for `rollback`.
#[async_trait]
pub trait CategoryApplier: Send + Sync {
    fn category(&self) -> UpdateCategory;

    /// Whether the current state can be snapshotted before replacement.
    fn can_snapshot(&self) -> bool;

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError>;

    /// Restores the state replaced by the last `apply`.
    async fn rollback(&self) -> Result<(), ApplyError>;
}

/// Everything the pipeline service talks to.
#[derive(Clone)]
pub struct PipelinePorts {
    pub fetcher: Arc<dyn PayloadFetcher>,
    pub verifier: Arc<dyn OriginVerifier>,
    pub store: Arc<dyn ContentStore>,
    pub events: Arc<dyn EventPublisher>,
    pub time: Arc<dyn TimeSource>,
}
