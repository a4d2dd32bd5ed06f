//! Outbound ports (SPI) for the self-healing pipeline.
//!
//! Self-healing never holds the dissemination engine; it sends fixes out
//! through [`FixBroadcaster`] and receives them as envelopes routed in by
//! node-runtime.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::EventPublisher;
use shared_types::{ContentStore, GeneratedFix, NodeId, PayloadFetcher, TimeSource};

/// Signs fix bytes with the local node key.
pub trait FixSigner: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String>;
}

/// Checks a signature against the key registered for `signer`.
pub trait FixVerifier: Send + Sync {
    fn verify(&self, signer: &NodeId, message: &[u8], signature: &[u8]) -> Result<(), String>;
}

/// Disseminates a validated fix. Returns the envelope id.
#[async_trait]
pub trait FixBroadcaster: Send + Sync {
    async fn broadcast_fix(&self, fix: &GeneratedFix, payload: Vec<u8>) -> Result<String, String>;
}

/// Carries out an auto-applicable fix on this node.
#[async_trait]
pub trait FixExecutor: Send + Sync {
    async fn execute(&self, fix: &GeneratedFix) -> Result<(), String>;
}

/// Everything the self-healing service talks to.
#[derive(Clone)]
pub struct HealingPorts {
    pub signer: Arc<dyn FixSigner>,
    pub verifier: Arc<dyn FixVerifier>,
    pub broadcaster: Arc<dyn FixBroadcaster>,
    pub executor: Arc<dyn FixExecutor>,
    pub fetcher: Arc<dyn PayloadFetcher>,
    pub store: Arc<dyn ContentStore>,
    pub events: Arc<dyn EventPublisher>,
    pub time: Arc<dyn TimeSource>,
}
