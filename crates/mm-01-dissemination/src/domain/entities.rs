//! Core domain entities for dissemination.

use shared_types::{NodeId, UpdateEnvelope};

/// What this node knows about one peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    pub node_id: NodeId,
    /// Unix seconds when the peer was added.
    pub added_at: u64,
    /// Unix seconds of the last successful exchange in either direction.
    pub last_seen: u64,
    pub sends_ok: u64,
    pub sends_failed: u64,
}

impl PeerRecord {
    pub fn new(node_id: NodeId, now: u64) -> Self {
        Self {
            node_id,
            added_at: now,
            last_seen: now,
            sends_ok: 0,
            sends_failed: 0,
        }
    }

    pub fn record_send(&mut self, ok: bool, now: u64) {
        if ok {
            self.sends_ok += 1;
            self.last_seen = now;
        } else {
            self.sends_failed += 1;
        }
    }

    /// Fraction of sends that succeeded; 1.0 before any send.
    pub fn delivery_ratio(&self) -> f64 {
        let total = self.sends_ok + self.sends_failed;
        if total == 0 {
            return 1.0;
        }
        self.sends_ok as f64 / total as f64
    }
}

/// Result of one propagation step.
#[derive(Clone, Debug)]
pub struct PropagationReport {
    pub envelope_id: String,
    /// The copy handed to the transport, if any targets were chosen.
    pub forwarded: Option<UpdateEnvelope>,
    pub targets: Vec<NodeId>,
}

impl PropagationReport {
    pub fn empty(envelope_id: &str) -> Self {
        Self {
            envelope_id: envelope_id.to_string(),
            forwarded: None,
            targets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_record_send_tracking() {
        let mut record = PeerRecord::new(NodeId::new("b"), 100);
        assert_eq!(record.delivery_ratio(), 1.0);

        record.record_send(true, 150);
        record.record_send(false, 160);
        assert_eq!(record.sends_ok, 1);
        assert_eq!(record.sends_failed, 1);
        assert_eq!(record.last_seen, 150);
        assert_eq!(record.delivery_ratio(), 0.5);
    }
}
