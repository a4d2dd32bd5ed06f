//! # Self-Healing Service
//!
//! Implements [`SelfHealingApi`].
//!
//! ## Local issues
//!
//! `report_issue` stamps and stores the issue, counts its pattern, then
//! looks for a known template. Without one, a pattern seen
//! `synthesis_threshold` times is synthesized from the context shared by
//! the recent issues of its category. A resulting fix is signed, validated
//! by kind, executed if allowed, and disseminated only if it ran cleanly.
//! A rejected fix is not remembered against its pattern.
//!
//! ## Peer fixes
//!
//! `handle_incoming_fix` loads the payload, checks its digest, the fix
//! signature and the acceptance floor, then runs the same validation. A
//! fix envelope that cannot be loaded or verified is published as
//! `FixRefused` with its failure class.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::MeshEvent;
use shared_crypto::{is_content_digest, matches_content_digest};
use shared_types::{
    fetch_plan, DetectedIssue, GeneratedFix, NodeId, Rejection, UpdateEnvelope, UpdateFailure,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    decode_fix, encode_fix, synthesize, FixDraft, HealingConfig, HealingStats, IssueLog,
    PatternCounter, PatternKey, RecentIds, TemplateCatalogue, ValidationTable, Verdict,
};
use crate::events::{HealingError, IncomingFixOutcome};
use crate::ports::inbound::SelfHealingApi;
use crate::ports::outbound::HealingPorts;

struct HealingState {
    log: IssueLog,
    patterns: PatternCounter,
    handled_envelopes: RecentIds,
    handled_fixes: RecentIds,
}

enum Disposition {
    Applied,
    AwaitingOperator,
    Rejected(String),
}

/// Self-Healing Service.
pub struct SelfHealingService {
    config: HealingConfig,
    local: NodeId,
    state: Mutex<HealingState>,
    templates: RwLock<TemplateCatalogue>,
    validation: RwLock<ValidationTable>,
    stats: RwLock<HealingStats>,
    ports: HealingPorts,
}

impl SelfHealingService {
    /// Creates a service with the standard template catalogue and
    /// validation table.
    pub fn new(config: HealingConfig, local: NodeId, ports: HealingPorts) -> Self {
        Self::with_catalogue(config, local, ports, TemplateCatalogue::standard())
    }

    pub fn with_catalogue(
        config: HealingConfig,
        local: NodeId,
        ports: HealingPorts,
        templates: TemplateCatalogue,
    ) -> Self {
        Self {
            state: Mutex::new(HealingState {
                log: IssueLog::new(config.issue_retention),
                patterns: PatternCounter::new(config.pattern_capacity),
                handled_envelopes: RecentIds::new(config.handled_capacity),
                handled_fixes: RecentIds::new(config.handled_capacity),
            }),
            templates: RwLock::new(templates),
            validation: RwLock::new(ValidationTable::default()),
            stats: RwLock::new(HealingStats::default()),
            config,
            local,
            ports,
        }
    }

    pub fn config(&self) -> &HealingConfig {
        &self.config
    }

    pub fn add_template(&self, template: crate::domain::FixTemplate) {
        self.templates.write().add(template);
    }

    /// Stamps, counts and stores the issue; returns the draft fix, if one
    /// should be produced.
    fn record_issue(&self, issue: &mut DetectedIssue) -> (PatternKey, Option<FixDraft>) {
        let now = self.ports.time.now();
        issue.id = Uuid::new_v4().to_string();
        issue.detected_by = self.local.clone();
        issue.detected_at = now;

        let key = PatternKey::of(issue);
        let mut state = self.state.lock();
        let record = state.patterns.record(key.clone(), now);
        if let Some(fix_id) = record.fix_id {
            issue.proposed_fix_id = Some(fix_id);
            state.log.push(issue.clone());
            return (key, None);
        }
        state.log.push(issue.clone());

        if let Some(template) = self.templates.read().find(issue) {
            return (key, Some(FixDraft::from(template)));
        }
        if record.occurrences < self.config.synthesis_threshold {
            return (key, None);
        }
        let recent = state.log.recent(&issue.category, self.config.synthesis_window);
        (key, synthesize(issue, &recent, record.occurrences))
    }

    fn seal(&self, issue: &DetectedIssue, draft: FixDraft) -> Result<GeneratedFix, HealingError> {
        let mut fix = GeneratedFix {
            id: Uuid::new_v4().to_string(),
            issue_id: issue.id.clone(),
            category: issue.category.clone(),
            description: draft.description,
            kind: draft.kind,
            payload: draft.payload,
            confidence_score: draft.confidence.min(100),
            tested_locally: false,
            test_passed: false,
            generated_by: self.local.clone(),
            generated_at: self.ports.time.now(),
            signature: Vec::new(),
        };
        fix.signature = self
            .ports
            .signer
            .sign(&fix.signing_payload())
            .map_err(HealingError::Signing)?;
        Ok(fix)
    }

    async fn reject_fix(&self, fix: &GeneratedFix, reason: String) -> Disposition {
        self.stats.write().fixes_rejected += 1;
        warn!(fix_id = %fix.id, kind = %fix.kind, reason = %reason, "[mm-03] Fix rejected");
        self.ports
            .events
            .publish(MeshEvent::FixRejected {
                fix_id: fix.id.clone(),
                reason: reason.clone(),
            })
            .await;
        Disposition::Rejected(reason)
    }

    /// Validates by kind and runs the fix when allowed. Sets the local test
    /// flags on `fix`.
    async fn validate_and_apply(&self, fix: &mut GeneratedFix) -> Disposition {
        fix.tested_locally = false;
        fix.test_passed = false;
        let verdict = self.validation.read().validate(fix);
        match verdict {
            Verdict::AutoApply => {
                let result = self.ports.executor.execute(fix).await;
                fix.tested_locally = true;
                match result {
                    Ok(()) => {
                        fix.test_passed = true;
                        self.stats.write().fixes_applied += 1;
                        info!(
                            fix_id = %fix.id,
                            kind = %fix.kind,
                            category = %fix.category,
                            generated_by = %fix.generated_by,
                            "[mm-03] Fix applied"
                        );
                        self.ports
                            .events
                            .publish(MeshEvent::FixApplied {
                                fix_id: fix.id.clone(),
                                kind: fix.kind,
                                generated_by: fix.generated_by.clone(),
                            })
                            .await;
                        Disposition::Applied
                    }
                    Err(e) => self.reject_fix(fix, format!("execution failed: {}", e)).await,
                }
            }
            Verdict::Advisory | Verdict::OperatorRequired => {
                self.stats.write().awaiting_operator += 1;
                info!(fix_id = %fix.id, kind = %fix.kind, "[mm-03] Fix needs operator action");
                self.ports
                    .events
                    .publish(MeshEvent::OperatorActionRequired {
                        fix_id: fix.id.clone(),
                        kind: fix.kind,
                        description: fix.description.clone(),
                    })
                    .await;
                Disposition::AwaitingOperator
            }
            Verdict::Rejected(reason) => self.reject_fix(fix, reason).await,
        }
    }

    async fn disseminate(&self, fix: &GeneratedFix) {
        let payload = match encode_fix(fix) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(fix_id = %fix.id, error = %e, "[mm-03] Fix encoding failed");
                return;
            }
        };
        self.state.lock().handled_fixes.insert(&fix.id);
        match self.ports.broadcaster.broadcast_fix(fix, payload).await {
            Ok(envelope_id) => {
                self.stats.write().fixes_disseminated += 1;
                info!(fix_id = %fix.id, envelope_id = %envelope_id, "[mm-03] Fix disseminated");
            }
            Err(e) => warn!(fix_id = %fix.id, error = %e, "[mm-03] Fix dissemination failed"),
        }
    }

    async fn refuse_fix(&self, envelope_id: String, origin: NodeId, rejection: Rejection) {
        self.stats.write().fixes_refused += 1;
        warn!(
            envelope_id = %envelope_id,
            origin = %origin,
            failure = %rejection.failure,
            detail = %rejection.detail,
            "[mm-03] Peer fix refused"
        );
        self.ports
            .events
            .publish(MeshEvent::FixRefused {
                envelope_id,
                origin,
                rejection,
            })
            .await;
    }

    /// Loads and verifies a peer fix, then runs it through the acceptance
    /// floor and the validation table.
    async fn take_in_fix(&self, envelope: UpdateEnvelope) -> Result<IncomingFixOutcome, HealingError> {
        let payload = self.load_payload(&envelope).await?;
        if !matches_content_digest(&payload, &envelope.payload_hash) {
            return Err(HealingError::Corrupt("payload hash mismatch".into()));
        }
        let mut fix = decode_fix(&payload).map_err(|e| HealingError::Malformed(e.to_string()))?;
        if fix.generated_by != envelope.origin_node_id {
            return Err(HealingError::Untrusted(format!(
                "fix generated by {} carried by envelope from {}",
                fix.generated_by, envelope.origin_node_id
            )));
        }
        self.ports
            .verifier
            .verify(&fix.generated_by, &fix.signing_payload(), &fix.signature)
            .map_err(HealingError::Untrusted)?;

        {
            let mut state = self.state.lock();
            if !state.handled_envelopes.insert(&envelope.id) || !state.handled_fixes.insert(&fix.id) {
                return Ok(IncomingFixOutcome::Duplicate);
            }
        }
        if let Err(e) = self.ports.store.put(&envelope.id, payload).await {
            warn!(envelope_id = %envelope.id, error = %e, "[mm-03] Could not keep fix payload");
        }
        self.stats.write().fixes_received += 1;

        let fix_id = fix.id.clone();
        if fix.confidence_score < self.config.acceptance_floor {
            let reason = format!(
                "confidence {} below acceptance floor {}",
                fix.confidence_score, self.config.acceptance_floor
            );
            self.reject_fix(&fix, reason.clone()).await;
            return Ok(IncomingFixOutcome::Rejected { fix_id, reason });
        }

        Ok(match self.validate_and_apply(&mut fix).await {
            Disposition::Applied => IncomingFixOutcome::Applied { fix_id },
            Disposition::AwaitingOperator => IncomingFixOutcome::AwaitingOperator { fix_id },
            Disposition::Rejected(reason) => IncomingFixOutcome::Rejected { fix_id, reason },
        })
    }

    async fn load_payload(&self, envelope: &UpdateEnvelope) -> Result<Vec<u8>, HealingError> {
        if let Ok(bytes) = self.ports.store.get(&envelope.id).await {
            return Ok(bytes);
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
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_error = format!("{}: {}", source, e),
            }
        }
        Err(HealingError::PayloadUnavailable(last_error))
    }
}

#[async_trait]
impl SelfHealingApi for SelfHealingService {
    async fn report_issue(&self, mut issue: DetectedIssue) -> Result<Option<GeneratedFix>, HealingError> {
        if issue.category.trim().is_empty() {
            return Err(HealingError::InvalidIssue("empty category".into()));
        }

        let (key, draft) = self.record_issue(&mut issue);
        debug!(
            issue_id = %issue.id,
            category = %issue.category,
            severity = %issue.severity,
            "[mm-03] Issue recorded"
        );
        self.ports
            .events
            .publish(MeshEvent::IssueReported(issue.clone()))
            .await;

        let Some(draft) = draft else {
            return Ok(None);
        };
        let mut fix = self.seal(&issue, draft)?;
        {
            let mut state = self.state.lock();
            state.patterns.attach_fix(&key, &fix.id);
            if let Some(stored) = state.log.get_mut(&issue.id) {
                stored.proposed_fix_id = Some(fix.id.clone());
            }
        }
        self.stats.write().fixes_generated += 1;
        info!(
            fix_id = %fix.id,
            issue_id = %issue.id,
            kind = %fix.kind,
            confidence = fix.confidence_score,
            "[mm-03] Fix generated"
        );
        self.ports
            .events
            .publish(MeshEvent::FixGenerated(fix.clone()))
            .await;

        match self.validate_and_apply(&mut fix).await {
            Disposition::Applied => self.disseminate(&fix).await,
            Disposition::AwaitingOperator => {}
            // The next occurrence gets a fresh match or synthesis.
            Disposition::Rejected(_) => self.state.lock().patterns.detach_fix(&key, &fix.id),
        }
        Ok(Some(fix))
    }

    async fn handle_incoming_fix(&self, envelope: UpdateEnvelope) -> Result<IncomingFixOutcome, HealingError> {
        if !envelope.category.is_fix() {
            return Err(HealingError::NotAFix(envelope.id));
        }
        if self.state.lock().handled_envelopes.contains(&envelope.id) {
            return Ok(IncomingFixOutcome::Duplicate);
        }

        let envelope_id = envelope.id.clone();
        let origin = envelope.origin_node_id.clone();
        let result = self.take_in_fix(envelope).await;
        if let Err(e) = &result {
            if let Some(rejection) = e.rejection() {
                self.refuse_fix(envelope_id, origin, rejection).await;
            }
        }
        result
    }

    fn screen_envelope(&self, envelope: &UpdateEnvelope) -> Result<(), Rejection> {
        if !envelope.category.is_fix() {
            return Err(Rejection::new(UpdateFailure::Corrupt, "not a fix envelope"));
        }
        if !is_content_digest(&envelope.payload_hash) || envelope.payload_size_bytes == 0 {
            return Err(Rejection::new(UpdateFailure::Corrupt, "malformed payload reference"));
        }
        if envelope.signature.is_empty() {
            return Err(Rejection::new(UpdateFailure::Untrusted, "envelope is unsigned"));
        }
        let now = self.ports.time.now();
        if envelope.created_at > now.saturating_add(self.config.max_future_skew_secs) {
            return Err(Rejection::new(UpdateFailure::Stale, "created in the future"));
        }
        if now.saturating_sub(envelope.created_at) > self.config.max_fix_age_secs {
            return Err(Rejection::new(UpdateFailure::Stale, "fix envelope expired"));
        }
        self.ports
            .verifier
            .verify(&envelope.origin_node_id, &envelope.signing_payload(), &envelope.signature)
            .map_err(|e| Rejection::new(UpdateFailure::Untrusted, format!("bad signature: {}", e)))
    }

    fn stats(&self) -> HealingStats {
        let mut stats = self.stats.read().clone();
        let state = self.state.lock();
        stats.issues_stored = state.log.len();
        stats.patterns_tracked = state.patterns.len();
        stats
    }
}
