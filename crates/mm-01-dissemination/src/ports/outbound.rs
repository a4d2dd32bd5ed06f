//! Outbound ports (SPI) for the dissemination subsystem.
//!
//! Implemented by adapters in node-runtime.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::EventPublisher;
use shared_types::{ContentStore, NodeId, Rejection, TimeSource, TransportError, UpdateEnvelope};

/// Delivers an envelope to one peer.
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    async fn send(&self, peer: &NodeId, envelope: UpdateEnvelope) -> Result<(), TransportError>;
}

/// Signs canonical envelope bytes with the local node key.
pub trait EnvelopeSigner: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String>;
}

/// Decides whether an envelope may be relayed.
///
/// One verifier is registered per category; a default verifier may cover
/// the rest.
#[async_trait]
pub trait EnvelopeVerifier: Send + Sync {
    async fn verify(&self, envelope: &UpdateEnvelope) -> Result<(), Rejection>;
}

/// Everything the dissemination service talks to.
#[derive(Clone)]
pub struct DisseminationPorts {
    pub transport: Arc<dyn EnvelopeTransport>,
    pub signer: Arc<dyn EnvelopeSigner>,
    pub store: Arc<dyn ContentStore>,
    pub events: Arc<dyn EventPublisher>,
    pub time: Arc<dyn TimeSource>,
}
