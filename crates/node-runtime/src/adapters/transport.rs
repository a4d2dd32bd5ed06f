//! # Loopback Mesh Transport
//!
//! An in-process mesh: every registered node is reachable by id, envelopes
//! cross the link through the wire codec, and payloads are fetched straight
//! from the target node's content store.
//!
//! Links can be cut per node to exercise fetch fallback and unreachable
//! peers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use mm_01_dissemination::{parse_payload_locator, DisseminationApi, EnvelopeTransport};
use parking_lot::RwLock;
use shared_types::wire::{decode_envelope, encode_envelope};
use shared_types::{
    ContentStore, FetchSource, NodeId, PayloadFetcher, StoreError, TransportError, UpdateEnvelope,
};
use tracing::debug;

struct Endpoint {
    // Weak: the engine holds the mesh as its transport.
    engine: Weak<dyn DisseminationApi>,
    store: Arc<dyn ContentStore>,
}

/// Routes sends and fetches between nodes living in one process.
#[derive(Default)]
pub struct LoopbackMesh {
    endpoints: RwLock<HashMap<NodeId, Endpoint>>,
    offline: RwLock<HashSet<NodeId>>,
}

impl LoopbackMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node: NodeId, engine: Weak<dyn DisseminationApi>, store: Arc<dyn ContentStore>) {
        self.endpoints.write().insert(node, Endpoint { engine, store });
    }

    pub fn unregister(&self, node: &NodeId) -> bool {
        self.endpoints.write().remove(node).is_some()
    }

    /// Makes `node` unreachable until [`LoopbackMesh::reconnect`].
    pub fn disconnect(&self, node: &NodeId) {
        self.offline.write().insert(node.clone());
    }

    pub fn reconnect(&self, node: &NodeId) {
        self.offline.write().remove(node);
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.endpoints.read().keys().cloned().collect()
    }

    fn engine(&self, node: &NodeId) -> Result<Arc<dyn DisseminationApi>, TransportError> {
        self.check_online(node)?;
        self.endpoints
            .read()
            .get(node)
            .and_then(|endpoint| endpoint.engine.upgrade())
            .ok_or_else(|| TransportError::Unreachable(node.to_string()))
    }

    fn store(&self, node: &NodeId) -> Result<Arc<dyn ContentStore>, TransportError> {
        self.check_online(node)?;
        self.endpoints
            .read()
            .get(node)
            .map(|endpoint| endpoint.store.clone())
            .ok_or_else(|| TransportError::Unreachable(node.to_string()))
    }

    fn check_online(&self, node: &NodeId) -> Result<(), TransportError> {
        if self.offline.read().contains(node) {
            return Err(TransportError::Unreachable(node.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EnvelopeTransport for LoopbackMesh {
    async fn send(&self, peer: &NodeId, envelope: UpdateEnvelope) -> Result<(), TransportError> {
        let engine = self.engine(peer)?;
        let frame = encode_envelope(&envelope).map_err(|e| TransportError::Codec(e.to_string()))?;
        let received = decode_envelope(&frame).map_err(|e| TransportError::Codec(e.to_string()))?;
        let outcome = engine.receive_envelope(received).await;
        debug!(peer = %peer, envelope_id = %envelope.id, outcome = ?outcome, "Loopback delivery");
        Ok(())
    }
}

#[async_trait]
impl PayloadFetcher for LoopbackMesh {
    async fn fetch(&self, source: &FetchSource, envelope_id: &str) -> Result<Vec<u8>, TransportError> {
        let (node, key) = match source {
            FetchSource::Locator(locator) => parse_payload_locator(locator)
                .ok_or_else(|| TransportError::PayloadUnavailable(format!("bad locator {}", locator)))?,
            FetchSource::Peer(node) => (node.clone(), envelope_id.to_string()),
        };
        let store = self.store(&node)?;
        store.get(&key).await.map_err(|e| match e {
            StoreError::NotFound(_) => {
                TransportError::PayloadUnavailable(format!("{} has no payload {}", node, key))
            }
            other => TransportError::PayloadUnavailable(other.to_string()),
        })
    }
}
