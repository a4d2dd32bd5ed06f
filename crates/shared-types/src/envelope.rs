//! # `UpdateEnvelope`
//!
//! The signed metadata wrapper that travels between mesh nodes. Payload bytes
//! never ride inside the envelope; receivers fetch them by locator or from
//! the nodes on the propagation path.
//!
//! ## Security Properties
//!
//! - **Canonical Signing**: The origin signs `id:version:payload_hash:category`.
//!   Hop count and propagation path are relay bookkeeping and are NOT signed.
//! - **Loop Prevention**: `propagation_path` never contains a node twice and
//!   `hop_count` only grows.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::entities::{NodeId, UpdateCategory};

/// Signed metadata describing one versioned update.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    /// Globally unique id (UUID v4 text).
    pub id: String,
    /// Dotted version string such as `1.4.2`.
    pub version: String,
    pub category: UpdateCategory,
    /// Unix seconds at the origin.
    pub created_at: u64,
    /// Lowercase hex SHA-256 of the payload.
    pub payload_hash: String,
    /// Ed25519 signature by the origin over `signing_payload()`.
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
    pub origin_node_id: NodeId,
    pub hop_count: u32,
    /// Nodes that have relayed this envelope, origin first.
    pub propagation_path: Vec<NodeId>,
    pub payload_size_bytes: u64,
    /// Optional out-of-band locator for the payload (for example
    /// `mesh://node-a/<id>`).
    pub payload_locator: Option<String>,
    pub notes: Option<String>,
}

impl UpdateEnvelope {
    /// The canonical bytes covered by the origin signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_signing_string(&self.id, &self.version, &self.payload_hash, self.category).into_bytes()
    }

    /// Returns true if `node` already appears on the propagation path.
    pub fn has_visited(&self, node: &NodeId) -> bool {
        self.propagation_path.iter().any(|n| n == node)
    }

    /// Builds the copy a relay sends onward: one more hop, relay appended to
    /// the path unless it is already there.
    ///
    /// The receiver's own envelope is left untouched.
    pub fn forwarded_by(&self, relay: &NodeId) -> UpdateEnvelope {
        let mut next = self.clone();
        next.hop_count = self.hop_count.saturating_add(1);
        if !next.has_visited(relay) {
            next.propagation_path.push(relay.clone());
        }
        next
    }
}

/// `id:version:hash:category`
pub fn canonical_signing_string(id: &str, version: &str, payload_hash: &str, category: UpdateCategory) -> String {
    format!("{}:{}:{}:{}", id, version, payload_hash, category.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UpdateEnvelope {
        UpdateEnvelope {
            id: "u-1".into(),
            version: "1.0.0".into(),
            category: UpdateCategory::Configuration,
            created_at: 1_700_000_000,
            payload_hash: "ab".repeat(32),
            signature: vec![1; 64],
            origin_node_id: NodeId::new("node-a"),
            hop_count: 0,
            propagation_path: vec![NodeId::new("node-a")],
            payload_size_bytes: 17,
            payload_locator: None,
            notes: None,
        }
    }

    #[test]
    fn test_signing_payload_is_canonical() {
        let env = sample();
        let expected = format!("u-1:1.0.0:{}:Configuration", "ab".repeat(32));
        assert_eq!(env.signing_payload(), expected.into_bytes());
    }

    #[test]
    fn test_signing_payload_ignores_relay_fields() {
        let env = sample();
        let fwd = env.forwarded_by(&NodeId::new("node-b"));
        assert_eq!(env.signing_payload(), fwd.signing_payload());
    }

    #[test]
    fn test_forwarded_by_origin_does_not_duplicate_path() {
        let env = sample();
        let fwd = env.forwarded_by(&NodeId::new("node-a"));
        assert_eq!(fwd.hop_count, 1);
        assert_eq!(fwd.propagation_path, vec![NodeId::new("node-a")]);
    }

    #[test]
    fn test_forwarded_by_relay_appends_and_leaves_original() {
        let env = sample();
        let fwd = env.forwarded_by(&NodeId::new("node-b"));
        assert_eq!(fwd.hop_count, 1);
        assert_eq!(fwd.propagation_path.len(), 2);
        assert!(fwd.has_visited(&NodeId::new("node-b")));
        assert_eq!(env.hop_count, 0);
        assert_eq!(env.propagation_path.len(), 1);
    }
}
