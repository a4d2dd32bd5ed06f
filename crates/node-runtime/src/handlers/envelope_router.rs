//! # Envelope Router
//!
//! Routes envelopes accepted by dissemination to the subsystem that acts on
//! them:
//!
//! ```text
//! EnvelopeReceived ─┬─ category Fix ──→ self-healing (handle_incoming_fix)
//!                   └─ anything else ─→ update pipeline (process)
//! ```
//!
//! Each envelope runs in its own task so unrelated pipelines never wait on
//! each other. On shutdown the router stops taking envelopes and waits for
//! the runs already started.

use std::sync::Arc;

use mm_02_update_pipeline::{PipelineOutcome, UpdatePipelineApi};
use mm_03_self_healing::SelfHealingApi;
use shared_bus::{MeshEvent, Subscription};
use shared_types::UpdateEnvelope;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub struct EnvelopeRouter {
    subscription: Subscription,
    pipeline: Arc<dyn UpdatePipelineApi>,
    healing: Arc<dyn SelfHealingApi>,
}

impl EnvelopeRouter {
    /// `subscription` should carry at least the dissemination topic.
    pub fn new(
        subscription: Subscription,
        pipeline: Arc<dyn UpdatePipelineApi>,
        healing: Arc<dyn SelfHealingApi>,
    ) -> Self {
        Self {
            subscription,
            pipeline,
            healing,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Envelope router started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Envelope router: shutdown signal received");
                    break;
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                event = self.subscription.recv() => match event {
                    Some(MeshEvent::EnvelopeReceived(envelope)) => {
                        let pipeline = self.pipeline.clone();
                        let healing = self.healing.clone();
                        in_flight.spawn(route(envelope, pipeline, healing));
                    }
                    Some(_) => {}
                    None => {
                        info!("Envelope router: bus closed");
                        break;
                    }
                },
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Envelope router: draining in-flight runs");
        }
        while in_flight.join_next().await.is_some() {}
    }
}

async fn route(
    envelope: UpdateEnvelope,
    pipeline: Arc<dyn UpdatePipelineApi>,
    healing: Arc<dyn SelfHealingApi>,
) {
    let envelope_id = envelope.id.clone();
    if envelope.category.is_fix() {
        match healing.handle_incoming_fix(envelope).await {
            Ok(outcome) => debug!(envelope_id = %envelope_id, outcome = ?outcome, "[mm-03] Peer fix handled"),
            // Refusals are logged and published by self-healing.
            Err(e) => debug!(envelope_id = %envelope_id, error = %e, "[mm-03] Peer fix not taken"),
        }
        return;
    }

    // Applied and rejected runs are logged and published by the pipeline.
    if let PipelineOutcome::AlreadyHandled(state) = pipeline.process(envelope).await {
        debug!(envelope_id = %envelope_id, state = %state, "[mm-02] Already handled");
    }
}
