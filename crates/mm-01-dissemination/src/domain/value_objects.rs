//! Value objects for dissemination configuration and shared state.

use parking_lot::{Mutex, RwLock};
use shared_types::NodeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use super::PeerRecord;

/// Dissemination configuration.
#[derive(Clone, Debug)]
pub struct DisseminationConfig {
    /// Number of peers each accepted envelope is forwarded to.
    pub fanout: usize,
    /// Envelopes with `hop_count >= max_hops` are dropped on receipt.
    pub max_hops: u32,
    /// Seen set capacity; least recently touched ids are evicted first.
    pub seen_capacity: usize,
    /// Maximum peers tracked by this node.
    pub peer_capacity: usize,
}

impl Default for DisseminationConfig {
    fn default() -> Self {
        Self {
            fanout: 3,
            max_hops: 10,
            seen_capacity: 100_000,
            peer_capacity: 1_024,
        }
    }
}

#[derive(Default)]
struct SeenInner {
    /// id -> recency stamp
    stamps: HashMap<String, u64>,
    /// recency stamp -> id, oldest first
    order: BTreeMap<u64, String>,
    next_stamp: u64,
}

impl SeenInner {
    fn touch(&mut self, id: &str) -> bool {
        let stamp = self.next_stamp;
        let Some(old) = self.stamps.get_mut(id) else {
            return false;
        };
        self.order.remove(&*old);
        *old = stamp;
        self.order.insert(stamp, id.to_string());
        self.next_stamp += 1;
        true
    }
}

/// Bounded LRU set of envelope ids this node has accepted.
///
/// Check and insert happen under one lock so two concurrent receipts of the
/// same id cannot both be accepted.
pub struct SeenSet {
    inner: Mutex<SeenInner>,
    capacity: usize,
    evictions: AtomicU64,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SeenInner::default()),
            capacity: capacity.max(1),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().stamps.contains_key(id)
    }

    /// Inserts `id`. Returns false if it was already present, in which case
    /// it is marked as recently used instead.
    pub fn insert(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.touch(id) {
            return false;
        }

        if inner.stamps.len() >= self.capacity {
            if let Some((_, oldest)) = inner.order.pop_first() {
                inner.stamps.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        inner.stamps.insert(id.to_string(), stamp);
        inner.order.insert(stamp, id.to_string());
        true
    }

    /// Marks `id` as recently used. Returns false if absent.
    pub fn touch(&self, id: &str) -> bool {
        self.inner.lock().touch(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Outcome of adding a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAdmission {
    Added,
    AlreadyPresent,
    Full,
}

/// The peers this node gossips to.
pub struct PeerSet {
    peers: RwLock<HashMap<NodeId, PeerRecord>>,
    capacity: usize,
}

impl PeerSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn add(&self, node_id: NodeId, now: u64) -> PeerAdmission {
        let mut peers = self.peers.write();
        if peers.contains_key(&node_id) {
            return PeerAdmission::AlreadyPresent;
        }
        if peers.len() >= self.capacity {
            return PeerAdmission::Full;
        }
        peers.insert(node_id.clone(), PeerRecord::new(node_id, now));
        PeerAdmission::Added
    }

    pub fn remove(&self, node_id: &NodeId) -> bool {
        self.peers.write().remove(node_id).is_some()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.peers.read().contains_key(node_id)
    }

    /// Snapshot of current peer ids, sorted for stable output.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.peers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, node_id: &NodeId) -> Option<PeerRecord> {
        self.peers.read().get(node_id).cloned()
    }

    /// Records a send result. Ignored if the peer was removed meanwhile.
    pub fn record_send(&self, node_id: &NodeId, ok: bool, now: u64) {
        if let Some(record) = self.peers.write().get_mut(node_id) {
            record.record_send(ok, now);
        }
    }

    /// Records that the peer relayed something to us.
    pub fn mark_seen(&self, node_id: &NodeId, now: u64) {
        if let Some(record) = self.peers.write().get_mut(node_id) {
            record.last_seen = now;
        }
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

/// Relay counters, updated lock-free from handlers and send tasks.
#[derive(Debug, Default)]
pub struct DisseminationMetrics {
    pub processed: AtomicU64,
    pub duplicates: AtomicU64,
    pub hop_limited: AtomicU64,
    pub rejected: AtomicU64,
    pub broadcasts: AtomicU64,
    pub forwards_dispatched: AtomicU64,
    pub send_failures: AtomicU64,
}

impl DisseminationMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, seen_len: usize, peer_count: usize) -> DisseminationStats {
        DisseminationStats {
            processed: self.processed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            hop_limited: self.hop_limited.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            forwards_dispatched: self.forwards_dispatched.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            seen_len,
            peer_count,
        }
    }
}

/// Point-in-time copy of the relay counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisseminationStats {
    pub processed: u64,
    pub duplicates: u64,
    pub hop_limited: u64,
    pub rejected: u64,
    pub broadcasts: u64,
    pub forwards_dispatched: u64,
    pub send_failures: u64,
    pub seen_len: usize,
    pub peer_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DisseminationConfig::default();
        assert_eq!(config.fanout, 3);
        assert_eq!(config.max_hops, 10);
    }

    #[test]
    fn test_seen_set_insert_once() {
        let seen = SeenSet::new(10);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.contains("a"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_seen_set_evicts_least_recently_used() {
        let seen = SeenSet::new(2);
        seen.insert("a");
        seen.insert("b");
        // "a" becomes most recent, so "b" is evicted next.
        assert!(seen.touch("a"));
        seen.insert("c");

        assert!(seen.contains("a"));
        assert!(!seen.contains("b"));
        assert!(seen.contains("c"));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.evictions(), 1);
    }

    #[test]
    fn test_peer_set_admission() {
        let peers = PeerSet::new(2);
        assert_eq!(peers.add(NodeId::new("b"), 0), PeerAdmission::Added);
        assert_eq!(peers.add(NodeId::new("b"), 0), PeerAdmission::AlreadyPresent);
        assert_eq!(peers.add(NodeId::new("c"), 0), PeerAdmission::Added);
        assert_eq!(peers.add(NodeId::new("d"), 0), PeerAdmission::Full);

        assert!(peers.remove(&NodeId::new("b")));
        assert!(!peers.remove(&NodeId::new("b")));
        assert_eq!(peers.ids(), vec![NodeId::new("c")]);
    }

    #[test]
    fn test_peer_set_record_send_after_removal_is_ignored() {
        let peers = PeerSet::new(4);
        peers.add(NodeId::new("b"), 0);
        peers.record_send(&NodeId::new("b"), true, 5);
        assert_eq!(peers.get(&NodeId::new("b")).map(|r| r.sends_ok), Some(1));

        peers.remove(&NodeId::new("b"));
        peers.record_send(&NodeId::new("b"), true, 6);
        assert!(peers.get(&NodeId::new("b")).is_none());
    }
}
