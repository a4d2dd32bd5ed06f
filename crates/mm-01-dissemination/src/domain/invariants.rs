//! Relay invariants checked before an envelope is accepted.

use std::collections::HashSet;

use shared_types::UpdateEnvelope;

use super::DisseminationConfig;

/// INVARIANT-1: Hop Bound
/// An envelope is never accepted once its hop count reaches the limit.
pub fn invariant_hop_bound(envelope: &UpdateEnvelope, config: &DisseminationConfig) -> bool {
    envelope.hop_count < config.max_hops
}

/// INVARIANT-2: Path Uniqueness
/// No node appears twice on a propagation path.
pub fn invariant_path_unique(envelope: &UpdateEnvelope) -> bool {
    let mut seen = HashSet::with_capacity(envelope.propagation_path.len());
    envelope.propagation_path.iter().all(|node| seen.insert(node))
}

/// INVARIANT-3: Path Origin
/// A non-empty path starts at the origin.
pub fn invariant_path_origin(envelope: &UpdateEnvelope) -> bool {
    envelope
        .propagation_path
        .first()
        .map_or(true, |first| *first == envelope.origin_node_id)
}

/// Relay check result.
#[derive(Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    HopLimitReached,
    DuplicatePathEntry,
    PathOriginMismatch,
}

/// Check all relay invariants for an incoming envelope.
pub fn check_relay_invariants(
    envelope: &UpdateEnvelope,
    config: &DisseminationConfig,
) -> Result<(), InvariantViolation> {
    if !invariant_hop_bound(envelope, config) {
        return Err(InvariantViolation::HopLimitReached);
    }

    if !invariant_path_unique(envelope) {
        return Err(InvariantViolation::DuplicatePathEntry);
    }

    if !invariant_path_origin(envelope) {
        return Err(InvariantViolation::PathOriginMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{NodeId, UpdateCategory};

    fn envelope(hop_count: u32, path: &[&str]) -> UpdateEnvelope {
        UpdateEnvelope {
            id: "e".into(),
            version: "1.0.0".into(),
            category: UpdateCategory::BlockedList,
            created_at: 0,
            payload_hash: String::new(),
            signature: vec![],
            origin_node_id: NodeId::new("a"),
            hop_count,
            propagation_path: path.iter().map(|p| NodeId::new(*p)).collect(),
            payload_size_bytes: 1,
            payload_locator: None,
            notes: None,
        }
    }

    #[test]
    fn test_hop_bound() {
        let config = DisseminationConfig::default();
        assert!(check_relay_invariants(&envelope(9, &["a"]), &config).is_ok());
        assert_eq!(
            check_relay_invariants(&envelope(10, &["a"]), &config),
            Err(InvariantViolation::HopLimitReached)
        );
    }

    #[test]
    fn test_path_shape() {
        let config = DisseminationConfig::default();
        assert_eq!(
            check_relay_invariants(&envelope(2, &["a", "b", "a"]), &config),
            Err(InvariantViolation::DuplicatePathEntry)
        );
        assert_eq!(
            check_relay_invariants(&envelope(1, &["b"]), &config),
            Err(InvariantViolation::PathOriginMismatch)
        );
        assert!(check_relay_invariants(&envelope(0, &[]), &config).is_ok());
    }
}
