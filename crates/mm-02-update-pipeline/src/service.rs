//! # Update Pipeline Service
//!
//! Implements [`UpdatePipelineApi`]. Each envelope runs through
//!
//! 1. Integrity (structure, freshness, origin policy, signature)
//! 2. Payload acquisition (local store, locator, then relays)
//! 3. Hash verification
//! 4. Sandbox battery
//! 5. Persist and apply through the category applier
//!
//! The first failing stage ends the run. Runs for different envelopes are
//! independent; only the stage tracker, the applied registry and the stats
//! are shared, each behind its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_bus::MeshEvent;
use shared_crypto::matches_content_digest;
use shared_types::{fetch_plan, NodeId, SandboxTestResult, UpdateCategory, UpdateEnvelope};
use tracing::{debug, info, warn};

use crate::domain::sandbox::{SandboxBattery, SandboxSubject, SandboxVerdict};
use crate::domain::{
    check_integrity, AppliedRecord, AppliedRegistry, PipelineConfig, PipelineReport,
    PipelineState, PipelineStats, Stage, StageTracker, VerificationLevel,
};
use crate::events::{PipelineError, PipelineOutcome};
use crate::ports::inbound::UpdatePipelineApi;
use crate::ports::outbound::{CategoryApplier, PipelinePorts};

struct StageFailure {
    stage: Stage,
    error: PipelineError,
    sandbox: Option<SandboxTestResult>,
}

impl StageFailure {
    fn at(stage: Stage, error: PipelineError) -> Self {
        Self {
            stage,
            error,
            sandbox: None,
        }
    }
}

/// Update Pipeline Service.
pub struct UpdatePipelineService {
    config: PipelineConfig,
    local: NodeId,
    battery: Arc<SandboxBattery>,
    appliers: RwLock<HashMap<UpdateCategory, Arc<dyn CategoryApplier>>>,
    tracker: StageTracker,
    registry: AppliedRegistry,
    stats: RwLock<PipelineStats>,
    ports: PipelinePorts,
}

impl UpdatePipelineService {
    /// Creates a service with the standard sandbox battery and no appliers.
    pub fn new(config: PipelineConfig, local: NodeId, ports: PipelinePorts) -> Self {
        let battery = SandboxBattery::standard(&config.sandbox);
        Self::with_battery(config, local, ports, battery)
    }

    pub fn with_battery(
        config: PipelineConfig,
        local: NodeId,
        ports: PipelinePorts,
        battery: SandboxBattery,
    ) -> Self {
        Self {
            tracker: StageTracker::new(config.stage_retention),
            config,
            local,
            battery: Arc::new(battery),
            appliers: RwLock::new(HashMap::new()),
            registry: AppliedRegistry::new(),
            stats: RwLock::new(PipelineStats::default()),
            ports,
        }
    }

    /// Registers the applier for its category, replacing any previous one.
    pub fn register_applier(&self, applier: Arc<dyn CategoryApplier>) {
        self.appliers.write().insert(applier.category(), applier);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn applier_for(&self, category: UpdateCategory) -> Option<Arc<dyn CategoryApplier>> {
        self.appliers.read().get(&category).cloned()
    }

    fn verify(&self, envelope: &UpdateEnvelope, level: VerificationLevel) -> Result<(), PipelineError> {
        check_integrity(envelope, &self.config.integrity, self.ports.time.now(), level)?;
        self.ports
            .verifier
            .verify(&envelope.origin_node_id, &envelope.signing_payload(), &envelope.signature)
            .map_err(|reason| PipelineError::RejectedUntrusted(format!("bad signature: {}", reason)))
    }

    /// Local store first, then the locator, then nodes on the path.
    async fn acquire(&self, envelope: &UpdateEnvelope) -> Result<Vec<u8>, PipelineError> {
        if self.ports.store.contains(&envelope.id).await {
            if let Ok(bytes) = self.ports.store.get(&envelope.id).await {
                return Ok(bytes);
            }
        }

        let plan = fetch_plan(
            envelope.payload_locator.as_deref(),
            &envelope.propagation_path,
            &envelope.origin_node_id,
            &self.local,
        );
        let mut last_error = String::from("no payload source");
        for source in plan {
            match self.ports.fetcher.fetch(&source, &envelope.id).await {
                Ok(bytes) => {
                    debug!(envelope_id = %envelope.id, source = %source, "[mm-02] Payload fetched");
                    return Ok(bytes);
                }
                Err(e) => {
                    debug!(envelope_id = %envelope.id, source = %source, error = %e, "[mm-02] Fetch attempt failed");
                    last_error = format!("{}: {}", source, e);
                }
            }
        }
        Err(PipelineError::FetchFailed(last_error))
    }

    fn check_hash(envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), PipelineError> {
        if payload.len() as u64 != envelope.payload_size_bytes {
            return Err(PipelineError::RejectedCorrupt(format!(
                "payload is {} bytes, envelope declares {}",
                payload.len(),
                envelope.payload_size_bytes
            )));
        }
        if !matches_content_digest(payload, &envelope.payload_hash) {
            return Err(PipelineError::RejectedCorrupt("payload hash mismatch".into()));
        }
        Ok(())
    }

    async fn run_battery(&self, subject: SandboxSubject) -> SandboxVerdict {
        let battery = self.battery.clone();
        let time = self.ports.time.clone();
        let subject_id = subject.envelope.id.clone();
        match tokio::task::spawn_blocking(move || battery.run(&subject, time.as_ref())).await {
            Ok(verdict) => verdict,
            Err(e) => {
                let now = self.ports.time.now();
                let reason = format!("battery aborted: {}", e);
                SandboxVerdict {
                    result: SandboxTestResult {
                        subject_id,
                        started_at: now,
                        finished_at: now,
                        tests_run: 0,
                        tests_passed: 0,
                        passed: false,
                        failure: Some(format!("sandbox: {}", reason)),
                    },
                    failed_test: Some(("sandbox".into(), reason)),
                }
            }
        }
    }

    async fn run(&self, envelope: &UpdateEnvelope) -> Result<PipelineReport, StageFailure> {
        let applier = self.applier_for(envelope.category).ok_or_else(|| {
            StageFailure::at(
                Stage::Received,
                PipelineError::ApplyFailed(format!("no applier for {}", envelope.category)),
            )
        })?;

        self.tracker.advance(&envelope.id, Stage::Verifying);
        self.verify(envelope, VerificationLevel::Deployment)
            .map_err(|e| StageFailure::at(Stage::Verifying, e))?;

        self.tracker.advance(&envelope.id, Stage::Downloading);
        let payload = self
            .acquire(envelope)
            .await
            .map_err(|e| StageFailure::at(Stage::Downloading, e))?;

        self.tracker.advance(&envelope.id, Stage::HashChecking);
        Self::check_hash(envelope, &payload).map_err(|e| StageFailure::at(Stage::HashChecking, e))?;

        self.tracker.advance(&envelope.id, Stage::SandboxTesting);
        let payload = Arc::new(payload);
        let verdict = self
            .run_battery(SandboxSubject {
                envelope: envelope.clone(),
                payload: payload.clone(),
                applied_version: self.registry.current(envelope.category).map(|r| r.version),
                rollback_available: applier.can_snapshot(),
            })
            .await;
        self.ports
            .events
            .publish(MeshEvent::SandboxCompleted(verdict.result.clone()))
            .await;
        if let Some((test, reason)) = verdict.failed_test {
            return Err(StageFailure {
                stage: Stage::SandboxTesting,
                error: PipelineError::RejectedUnsafe { test, reason },
                sandbox: Some(verdict.result),
            });
        }

        self.tracker.advance(&envelope.id, Stage::Applying);
        let apply_failed = |reason: String| StageFailure {
            stage: Stage::Applying,
            error: PipelineError::ApplyFailed(reason),
            sandbox: Some(verdict.result.clone()),
        };
        self.ports
            .store
            .put(&envelope.id, payload.to_vec())
            .await
            .map_err(|e| apply_failed(format!("persist: {}", e)))?;
        applier
            .apply(envelope, &payload)
            .await
            .map_err(|e| apply_failed(e.to_string()))?;
        self.registry.record(
            envelope.category,
            AppliedRecord {
                envelope_id: envelope.id.clone(),
                version: envelope.version.clone(),
                applied_at: self.ports.time.now(),
            },
        );

        Ok(PipelineReport {
            envelope_id: envelope.id.clone(),
            category: envelope.category,
            version: envelope.version.clone(),
            payload_size_bytes: payload.len() as u64,
            sandbox: verdict.result,
        })
    }
}

#[async_trait]
impl UpdatePipelineApi for UpdatePipelineService {
    async fn process(&self, envelope: UpdateEnvelope) -> PipelineOutcome {
        if let Err(state) = self.tracker.begin(&envelope.id) {
            debug!(envelope_id = %envelope.id, state = %state, "[mm-02] Envelope already handled");
            return PipelineOutcome::AlreadyHandled(state);
        }

        match self.run(&envelope).await {
            Ok(report) => {
                self.tracker.finish(&envelope.id, PipelineState::Applied);
                self.stats.write().applied += 1;
                info!(
                    envelope_id = %envelope.id,
                    category = %envelope.category,
                    version = %envelope.version,
                    "[mm-02] Update applied"
                );
                self.ports
                    .events
                    .publish(MeshEvent::UpdateApplied {
                        envelope_id: envelope.id.clone(),
                        category: envelope.category,
                        version: envelope.version.clone(),
                    })
                    .await;
                PipelineOutcome::Applied(report)
            }
            Err(StageFailure { stage, error, sandbox }) => {
                self.tracker.finish(&envelope.id, PipelineState::Rejected(stage));
                self.stats.write().record_failure(error.failure());
                warn!(
                    envelope_id = %envelope.id,
                    category = %envelope.category,
                    stage = %stage,
                    error = %error,
                    "[mm-02] Update rejected"
                );
                self.ports
                    .events
                    .publish(MeshEvent::UpdateFailed {
                        envelope_id: envelope.id.clone(),
                        category: envelope.category,
                        version: envelope.version.clone(),
                        stage: stage.as_str().to_string(),
                        rejection: error.to_rejection(),
                    })
                    .await;
                PipelineOutcome::Rejected { stage, error, sandbox }
            }
        }
    }

    fn check_integrity(&self, envelope: &UpdateEnvelope, level: VerificationLevel) -> Result<(), PipelineError> {
        self.verify(envelope, level)
    }

    fn state_of(&self, envelope_id: &str) -> Option<PipelineState> {
        self.tracker.state(envelope_id)
    }

    fn applied(&self, category: UpdateCategory) -> Option<AppliedRecord> {
        self.registry.current(category)
    }

    async fn rollback(&self, category: UpdateCategory) -> Result<(), PipelineError> {
        let applier = self
            .applier_for(category)
            .ok_or_else(|| PipelineError::ApplyFailed(format!("no applier for {}", category)))?;
        applier
            .rollback()
            .await
            .map_err(|e| PipelineError::ApplyFailed(e.to_string()))?;
        let restored = self.registry.revert(category);
        info!(
            category = %category,
            version = ?restored.map(|r| r.version),
            "[mm-02] Category rolled back"
        );
        Ok(())
    }

    fn stats(&self) -> PipelineStats {
        let mut stats = self.stats.read().clone();
        stats.in_flight = self.tracker.in_flight();
        stats
    }
}
