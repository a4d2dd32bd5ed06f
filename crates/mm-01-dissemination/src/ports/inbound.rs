//! Inbound ports (API) for the dissemination subsystem.

use async_trait::async_trait;
use shared_types::{NodeId, UpdateCategory, UpdateEnvelope};

use crate::domain::{DisseminationStats, PropagationReport};
use crate::events::{DisseminationError, ReceiveOutcome};

/// A locally originated update.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub category: UpdateCategory,
    pub version: String,
    pub payload: Vec<u8>,
    pub notes: Option<String>,
}

/// Primary API for the dissemination engine.
#[async_trait]
pub trait DisseminationApi: Send + Sync {
    /// The node id this engine signs and relays as.
    fn local_node(&self) -> &NodeId;

    /// Adds a peer. Returns false if it was already known, is the local
    /// node, or the peer set is full.
    async fn add_peer(&self, peer: NodeId) -> bool;

    /// Removes a peer. Returns false if it was unknown.
    async fn remove_peer(&self, peer: &NodeId) -> bool;

    fn peers(&self) -> Vec<NodeId>;

    /// Handles an envelope relayed by another node.
    ///
    /// Duplicate, hop-limited and unverifiable envelopes are dropped without
    /// side effects on the seen set.
    async fn receive_envelope(&self, envelope: UpdateEnvelope) -> ReceiveOutcome;

    /// Creates, signs and gossips a new envelope for `request`.
    ///
    /// The payload is parked in the content store under the envelope id so
    /// that peers can fetch it.
    async fn broadcast(&self, request: BroadcastRequest) -> Result<UpdateEnvelope, DisseminationError>;

    /// Forwards one more hop to a random subset of eligible peers.
    ///
    /// Sends are dispatched as independent tasks; this returns as soon as
    /// they are started.
    fn propagate(&self, envelope: &UpdateEnvelope) -> PropagationReport;

    fn has_seen(&self, envelope_id: &str) -> bool;

    fn stats(&self) -> DisseminationStats;
}
