//! Payload fetch port.
//!
//! Envelopes carry only a digest; payload bytes are fetched separately,
//! either from an explicit locator or from a node that already holds them.

use async_trait::async_trait;

use crate::entities::NodeId;
use crate::errors::TransportError;

/// Where to ask for payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    /// An out-of-band locator carried on the envelope.
    Locator(String),
    /// A node that has processed the envelope.
    Peer(NodeId),
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchSource::Locator(locator) => write!(f, "locator {}", locator),
            FetchSource::Peer(peer) => write!(f, "peer {}", peer),
        }
    }
}

/// Retrieves payload bytes by envelope id.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, source: &FetchSource, envelope_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Candidate sources for an envelope, in the order they should be tried:
/// the locator first, then the relays on the path from most recent to the
/// origin. `local` is skipped.
pub fn fetch_plan(
    locator: Option<&str>,
    propagation_path: &[NodeId],
    origin: &NodeId,
    local: &NodeId,
) -> Vec<FetchSource> {
    let mut plan = Vec::with_capacity(propagation_path.len() + 2);
    if let Some(locator) = locator {
        plan.push(FetchSource::Locator(locator.to_string()));
    }
    for node in propagation_path.iter().rev().chain(std::iter::once(origin)) {
        if node == local {
            continue;
        }
        let source = FetchSource::Peer(node.clone());
        if !plan.contains(&source) {
            plan.push(source);
        }
    }
    plan
}
