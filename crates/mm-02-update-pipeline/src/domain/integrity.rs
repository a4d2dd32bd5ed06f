//! Integrity checks on an envelope before any payload is fetched.
//!
//! Signature verification needs the keyring and lives in the service; the
//! checks here are pure.

use shared_crypto::is_content_digest;
use shared_types::UpdateEnvelope;

use super::value_objects::{FreshnessWindow, IntegrityPolicy, TrustPolicy, VerificationLevel};
use crate::events::PipelineError;

/// Rejects envelopes missing the fields every later stage relies on.
pub fn check_structure(envelope: &UpdateEnvelope) -> Result<(), PipelineError> {
    if envelope.id.trim().is_empty() {
        return Err(PipelineError::RejectedCorrupt("empty envelope id".into()));
    }
    if envelope.version.trim().is_empty() {
        return Err(PipelineError::RejectedCorrupt("empty version".into()));
    }
    if envelope.payload_hash.is_empty() {
        return Err(PipelineError::RejectedCorrupt("empty payload hash".into()));
    }
    if !is_content_digest(&envelope.payload_hash) {
        return Err(PipelineError::RejectedCorrupt(format!(
            "payload hash {:?} is not a content digest",
            envelope.payload_hash
        )));
    }
    if envelope.payload_size_bytes == 0 {
        return Err(PipelineError::RejectedCorrupt("payload size is zero".into()));
    }
    if envelope.signature.is_empty() {
        return Err(PipelineError::RejectedUntrusted("envelope is unsigned".into()));
    }
    Ok(())
}

/// Rejects envelopes created too far in the future or too long ago.
pub fn check_freshness(
    created_at: u64,
    now: u64,
    window: &FreshnessWindow,
    level: VerificationLevel,
) -> Result<(), PipelineError> {
    if created_at > now.saturating_add(window.max_future_skew_secs) {
        return Err(PipelineError::RejectedStale(format!(
            "created {}s in the future (limit {}s)",
            created_at - now,
            window.max_future_skew_secs
        )));
    }
    let max_age = window.max_age(level);
    let age = now.saturating_sub(created_at);
    if age > max_age {
        return Err(PipelineError::RejectedStale(format!(
            "age {}s exceeds {}s",
            age, max_age
        )));
    }
    Ok(())
}

pub fn check_trust(envelope: &UpdateEnvelope, trust: &TrustPolicy) -> Result<(), PipelineError> {
    if trust.admits(&envelope.origin_node_id) {
        Ok(())
    } else {
        Err(PipelineError::RejectedUntrusted(format!(
            "origin {} is not trusted",
            envelope.origin_node_id
        )))
    }
}

/// Structure, freshness and origin policy, in that order.
pub fn check_integrity(
    envelope: &UpdateEnvelope,
    policy: &IntegrityPolicy,
    now: u64,
    level: VerificationLevel,
) -> Result<(), PipelineError> {
    check_structure(envelope)?;
    check_freshness(envelope.created_at, now, &policy.freshness, level)?;
    check_trust(envelope, &policy.trust)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::content_digest;
    use shared_types::{NodeId, UpdateCategory};

    const NOW: u64 = 1_700_000_000;
    const DAY: u64 = 24 * 60 * 60;

    fn envelope(created_at: u64) -> UpdateEnvelope {
        UpdateEnvelope {
            id: "env-1".into(),
            version: "1.0.0".into(),
            category: UpdateCategory::Configuration,
            created_at,
            payload_hash: content_digest(b"{\"ssid\":\"mesh-1\"}"),
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
    fn test_future_envelope_is_stale() {
        let policy = IntegrityPolicy::default();
        let err = check_integrity(&envelope(NOW + 10 * 60), &policy, NOW, VerificationLevel::Deployment)
            .unwrap_err();
        assert!(matches!(err, PipelineError::RejectedStale(_)));

        assert!(check_integrity(&envelope(NOW + 60), &policy, NOW, VerificationLevel::Deployment).is_ok());
    }

    #[test]
    fn test_old_envelope_is_stale_at_deployment_level() {
        let policy = IntegrityPolicy::default();
        let err = check_integrity(&envelope(NOW - 31 * DAY), &policy, NOW, VerificationLevel::Deployment)
            .unwrap_err();
        assert!(matches!(err, PipelineError::RejectedStale(_)));
    }

    #[test]
    fn test_levels_use_different_windows() {
        let policy = IntegrityPolicy::default();
        let ten_days_old = envelope(NOW - 10 * DAY);
        assert!(check_integrity(&ten_days_old, &policy, NOW, VerificationLevel::Deployment).is_ok());
        assert!(matches!(
            check_integrity(&ten_days_old, &policy, NOW, VerificationLevel::Dissemination),
            Err(PipelineError::RejectedStale(_))
        ));
    }

    #[test]
    fn test_structural_rejections() {
        let policy = IntegrityPolicy::default();

        let mut env = envelope(NOW);
        env.payload_hash.clear();
        assert!(matches!(
            check_integrity(&env, &policy, NOW, VerificationLevel::Deployment),
            Err(PipelineError::RejectedCorrupt(_))
        ));

        let mut env = envelope(NOW);
        env.signature.clear();
        assert!(matches!(
            check_integrity(&env, &policy, NOW, VerificationLevel::Deployment),
            Err(PipelineError::RejectedUntrusted(_))
        ));

        let mut env = envelope(NOW);
        env.payload_size_bytes = 0;
        assert!(matches!(
            check_integrity(&env, &policy, NOW, VerificationLevel::Deployment),
            Err(PipelineError::RejectedCorrupt(_))
        ));
    }

    #[test]
    fn test_untrusted_origin() {
        let policy = IntegrityPolicy {
            trust: TrustPolicy {
                trusted_origin_prefixes: vec!["mesh-".into()],
                trusted_origins: vec![],
            },
            ..Default::default()
        };
        assert!(matches!(
            check_integrity(&envelope(NOW), &policy, NOW, VerificationLevel::Dissemination),
            Err(PipelineError::RejectedUntrusted(_))
        ));
    }
}
