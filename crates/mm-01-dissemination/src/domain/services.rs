//! Domain services for dissemination.

use rand::seq::SliceRandom;
use rand::Rng;
use shared_types::{NodeId, UpdateEnvelope};

/// Picks up to `fanout` peers uniformly at random, skipping the local node
/// and every node already on the envelope's propagation path.
pub fn select_fanout_targets<R: Rng + ?Sized>(
    peers: &[NodeId],
    envelope: &UpdateEnvelope,
    local: &NodeId,
    fanout: usize,
    rng: &mut R,
) -> Vec<NodeId> {
    let eligible: Vec<&NodeId> = peers
        .iter()
        .filter(|peer| *peer != local && !envelope.has_visited(peer))
        .collect();

    eligible
        .choose_multiple(rng, fanout)
        .map(|peer| (*peer).clone())
        .collect()
}

/// `mesh://<node>/<envelope id>`
pub fn payload_locator(node: &NodeId, envelope_id: &str) -> String {
    format!("mesh://{}/{}", node, envelope_id)
}

/// Splits a locator produced by [`payload_locator`].
pub fn parse_payload_locator(locator: &str) -> Option<(NodeId, String)> {
    let rest = locator.strip_prefix("mesh://")?;
    let (node, id) = rest.split_once('/')?;
    if node.is_empty() || id.is_empty() {
        return None;
    }
    Some((NodeId::new(node), id.to_string()))
}
