//! # Dissemination Service
//!
//! The main service implementation for envelope relay using epidemic gossip.
//!
//! ## Architecture
//!
//! This service implements the inbound port [`DisseminationApi`] and depends
//! on the outbound ports bundled in [`DisseminationPorts`] (transport, signer,
//! content store, event bus, clock), all implemented by adapters in
//! node-runtime. Relay verification is pluggable per category through
//! [`EnvelopeVerifier`].
//!
//! ## Receive Path
//!
//! 1. Deduplication (seen set)
//! 2. Hop bound and path shape
//! 3. Category verifier (freshness, trust, signature)
//! 4. Atomic insert into the seen set
//! 5. `EnvelopeReceived` published, then propagation
//!
//! Rejected envelopes are logged, counted and published, and never enter
//! the seen set, so a forged copy cannot shadow the genuine envelope.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    check_relay_invariants, payload_locator, select_fanout_targets, DisseminationConfig,
    DisseminationMetrics, DisseminationStats, InvariantViolation, PeerAdmission, PeerSet,
    PropagationReport, SeenSet,
};
use crate::events::{DisseminationError, ReceiveOutcome};
use crate::ports::inbound::{BroadcastRequest, DisseminationApi};
use crate::ports::outbound::{DisseminationPorts, EnvelopeVerifier};
use async_trait::async_trait;
use shared_bus::MeshEvent;
use shared_crypto::content_digest;
use shared_types::{NodeId, Rejection, UpdateCategory, UpdateEnvelope, UpdateFailure};

/// Dissemination Service.
///
/// ## Thread Safety
///
/// This service is shared across async tasks via `Arc`. The seen set does
/// its check-and-insert under a single lock; peers and verifiers sit behind
/// `RwLock`s; counters are atomics.
pub struct DisseminationService {
    config: DisseminationConfig,
    local: NodeId,
    seen: Arc<SeenSet>,
    peers: Arc<PeerSet>,
    verifiers: RwLock<HashMap<UpdateCategory, Arc<dyn EnvelopeVerifier>>>,
    default_verifier: RwLock<Option<Arc<dyn EnvelopeVerifier>>>,
    ports: DisseminationPorts,
    metrics: Arc<DisseminationMetrics>,
}

impl DisseminationService {
    pub fn new(config: DisseminationConfig, local: NodeId, ports: DisseminationPorts) -> Self {
        Self {
            seen: Arc::new(SeenSet::new(config.seen_capacity)),
            peers: Arc::new(PeerSet::new(config.peer_capacity)),
            verifiers: RwLock::new(HashMap::new()),
            default_verifier: RwLock::new(None),
            config,
            local,
            ports,
            metrics: Arc::new(DisseminationMetrics::default()),
        }
    }

    pub fn config(&self) -> &DisseminationConfig {
        &self.config
    }

    /// Registers the relay verifier for one category, replacing any previous one.
    pub fn register_verifier(&self, category: UpdateCategory, verifier: Arc<dyn EnvelopeVerifier>) {
        self.verifiers.write().insert(category, verifier);
    }

    /// Verifier used for categories with no dedicated entry.
    pub fn set_default_verifier(&self, verifier: Arc<dyn EnvelopeVerifier>) {
        *self.default_verifier.write() = Some(verifier);
    }

    fn verifier_for(&self, category: UpdateCategory) -> Option<Arc<dyn EnvelopeVerifier>> {
        if let Some(v) = self.verifiers.read().get(&category) {
            return Some(v.clone());
        }
        self.default_verifier.read().clone()
    }

    async fn reject(&self, envelope: &UpdateEnvelope, rejection: Rejection) -> ReceiveOutcome {
        DisseminationMetrics::incr(&self.metrics.rejected);
        warn!(
            envelope_id = %envelope.id,
            origin = %envelope.origin_node_id,
            category = %envelope.category,
            failure = %rejection.failure,
            reason = %rejection.detail,
            "[mm-01] Envelope rejected"
        );
        self.ports
            .events
            .publish(MeshEvent::EnvelopeRejected {
                envelope_id: envelope.id.clone(),
                origin: envelope.origin_node_id.clone(),
                rejection: rejection.clone(),
            })
            .await;
        ReceiveOutcome::Rejected(rejection)
    }

    fn validate_version(version: &str) -> Result<(), DisseminationError> {
        // ':' would make the canonical signing string ambiguous.
        if version.trim().is_empty() || version.contains(':') {
            return Err(DisseminationError::InvalidVersion(version.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DisseminationApi for DisseminationService {
    fn local_node(&self) -> &NodeId {
        &self.local
    }

    async fn add_peer(&self, peer: NodeId) -> bool {
        if peer == self.local {
            debug!(peer = %peer, "[mm-01] Ignoring self as peer");
            return false;
        }
        match self.peers.add(peer.clone(), self.ports.time.now()) {
            PeerAdmission::Added => {
                debug!(peer = %peer, "[mm-01] Peer added");
                self.ports.events.publish(MeshEvent::PeerAdded(peer)).await;
                true
            }
            PeerAdmission::AlreadyPresent => false,
            PeerAdmission::Full => {
                warn!(
                    peer = %peer,
                    capacity = self.config.peer_capacity,
                    "[mm-01] Peer set full, peer not added"
                );
                false
            }
        }
    }

    async fn remove_peer(&self, peer: &NodeId) -> bool {
        let removed = self.peers.remove(peer);
        if removed {
            debug!(peer = %peer, "[mm-01] Peer removed");
            self.ports
                .events
                .publish(MeshEvent::PeerRemoved(peer.clone()))
                .await;
        }
        removed
    }

    fn peers(&self) -> Vec<NodeId> {
        self.peers.ids()
    }

    async fn receive_envelope(&self, envelope: UpdateEnvelope) -> ReceiveOutcome {
        if self.seen.touch(&envelope.id) {
            DisseminationMetrics::incr(&self.metrics.duplicates);
            debug!(envelope_id = %envelope.id, "[mm-01] Duplicate envelope dropped");
            return ReceiveOutcome::Duplicate;
        }

        match check_relay_invariants(&envelope, &self.config) {
            Ok(()) => {}
            Err(InvariantViolation::HopLimitReached) => {
                DisseminationMetrics::incr(&self.metrics.hop_limited);
                debug!(
                    envelope_id = %envelope.id,
                    hop_count = envelope.hop_count,
                    max_hops = self.config.max_hops,
                    "[mm-01] Hop limit reached"
                );
                return ReceiveOutcome::HopLimitReached {
                    hop_count: envelope.hop_count,
                    max_hops: self.config.max_hops,
                };
            }
            Err(violation) => {
                let rejection =
                    Rejection::new(UpdateFailure::Corrupt, format!("malformed path: {:?}", violation));
                return self.reject(&envelope, rejection).await;
            }
        }

        let Some(verifier) = self.verifier_for(envelope.category) else {
            let rejection = Rejection::new(
                UpdateFailure::Untrusted,
                format!("no verifier registered for {}", envelope.category),
            );
            return self.reject(&envelope, rejection).await;
        };

        if let Err(rejection) = verifier.verify(&envelope).await {
            return self.reject(&envelope, rejection).await;
        }

        // A concurrent receipt of the same id may have won while we verified.
        if !self.seen.insert(&envelope.id) {
            DisseminationMetrics::incr(&self.metrics.duplicates);
            return ReceiveOutcome::Duplicate;
        }
        DisseminationMetrics::incr(&self.metrics.processed);

        if let Some(sender) = envelope.propagation_path.last() {
            self.peers.mark_seen(sender, self.ports.time.now());
        }

        self.ports
            .events
            .publish(MeshEvent::EnvelopeReceived(envelope.clone()))
            .await;

        let report = self.propagate(&envelope);
        info!(
            envelope_id = %envelope.id,
            category = %envelope.category,
            version = %envelope.version,
            hop_count = envelope.hop_count,
            forwarded_to = report.targets.len(),
            "[mm-01] Envelope accepted"
        );

        ReceiveOutcome::Accepted {
            forwarded_to: report.targets.len(),
        }
    }

    async fn broadcast(&self, request: BroadcastRequest) -> Result<UpdateEnvelope, DisseminationError> {
        if request.payload.is_empty() {
            return Err(DisseminationError::EmptyPayload);
        }
        Self::validate_version(&request.version)?;

        let id = Uuid::new_v4().to_string();
        let mut envelope = UpdateEnvelope {
            payload_locator: Some(payload_locator(&self.local, &id)),
            id,
            version: request.version,
            category: request.category,
            created_at: self.ports.time.now(),
            payload_hash: content_digest(&request.payload),
            signature: Vec::new(),
            origin_node_id: self.local.clone(),
            hop_count: 0,
            propagation_path: vec![self.local.clone()],
            payload_size_bytes: request.payload.len() as u64,
            notes: request.notes,
        };
        envelope.signature = self
            .ports
            .signer
            .sign(&envelope.signing_payload())
            .map_err(DisseminationError::Signing)?;

        self.ports.store.put(&envelope.id, request.payload).await?;

        self.seen.insert(&envelope.id);
        DisseminationMetrics::incr(&self.metrics.broadcasts);

        self.ports
            .events
            .publish(MeshEvent::EnvelopeBroadcast(envelope.clone()))
            .await;

        let report = self.propagate(&envelope);
        info!(
            envelope_id = %envelope.id,
            category = %envelope.category,
            version = %envelope.version,
            size = envelope.payload_size_bytes,
            forwarded_to = report.targets.len(),
            "[mm-01] Envelope broadcast"
        );

        Ok(envelope)
    }

    fn propagate(&self, envelope: &UpdateEnvelope) -> PropagationReport {
        if envelope.hop_count >= self.config.max_hops {
            debug!(envelope_id = %envelope.id, "[mm-01] Not forwarding: hop limit");
            return PropagationReport::empty(&envelope.id);
        }

        let forwarded = envelope.forwarded_by(&self.local);
        let candidates = self.peers.ids();
        let targets = select_fanout_targets(
            &candidates,
            &forwarded,
            &self.local,
            self.config.fanout,
            &mut rand::thread_rng(),
        );

        if targets.is_empty() {
            debug!(envelope_id = %envelope.id, "[mm-01] No eligible peers");
            return PropagationReport::empty(&envelope.id);
        }

        DisseminationMetrics::add(&self.metrics.forwards_dispatched, targets.len() as u64);

        for peer in &targets {
            let peer = peer.clone();
            let copy = forwarded.clone();
            let transport = self.ports.transport.clone();
            let peers = self.peers.clone();
            let metrics = self.metrics.clone();
            let time = self.ports.time.clone();

            tokio::spawn(async move {
                let envelope_id = copy.id.clone();
                match transport.send(&peer, copy).await {
                    Ok(()) => peers.record_send(&peer, true, time.now()),
                    Err(e) => {
                        DisseminationMetrics::incr(&metrics.send_failures);
                        peers.record_send(&peer, false, time.now());
                        debug!(
                            envelope_id = %envelope_id,
                            peer = %peer,
                            error = %e,
                            "[mm-01] Forward failed"
                        );
                    }
                }
            });
        }

        PropagationReport {
            envelope_id: envelope.id.clone(),
            forwarded: Some(forwarded),
            targets,
        }
    }

    fn has_seen(&self, envelope_id: &str) -> bool {
        self.seen.contains(envelope_id)
    }

    fn stats(&self) -> DisseminationStats {
        self.metrics.snapshot(self.seen.len(), self.peers.len())
    }
}
