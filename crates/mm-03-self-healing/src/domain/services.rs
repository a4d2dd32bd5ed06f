//! Fix synthesis and fix payload encoding.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use shared_types::{DetectedIssue, FixKind, GeneratedFix};

use super::entities::FixDraft;

/// Confidence never exceeds this for a synthesized fix.
pub const SYNTHESIS_CONFIDENCE_CAP: u8 = 85;

/// Context pairs shared by every issue in `recent`.
pub fn common_context(recent: &[&DetectedIssue]) -> BTreeMap<String, String> {
    let Some((first, rest)) = recent.split_first() else {
        return BTreeMap::new();
    };
    first
        .context
        .iter()
        .filter(|(key, value)| rest.iter().all(|issue| issue.context.get(*key) == Some(*value)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Builds a configuration change that steers the affected subsystem away
/// from the conditions every recent occurrence shared.
///
/// Returns `None` when the recent issues have nothing in common.
pub fn synthesize(issue: &DetectedIssue, recent: &[&DetectedIssue], occurrences: u32) -> Option<FixDraft> {
    let common = common_context(recent);
    if common.is_empty() {
        return None;
    }

    let avoid: Map<String, Value> = common
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let mut per_category = Map::new();
    per_category.insert(
        issue.category.clone(),
        json!({ "avoid": avoid, "observed": occurrences }),
    );
    let payload = json!({ "self_healing": per_category });

    let shared = u32::try_from(common.len()).unwrap_or(u32::MAX);
    let score = 40u32
        .saturating_add(occurrences.saturating_mul(5))
        .saturating_add(shared.saturating_mul(5));
    let confidence = score.min(SYNTHESIS_CONFIDENCE_CAP as u32) as u8;
    let keys: Vec<&str> = common.keys().map(String::as_str).collect();
    Some(FixDraft {
        kind: FixKind::ConfigChange,
        description: format!(
            "Avoid conditions shared by {} {} issues ({})",
            recent.len(),
            issue.category,
            keys.join(", ")
        ),
        payload: payload.to_string(),
        confidence,
    })
}

/// Wire form of a fix carried as a Fix-category envelope payload.
pub fn encode_fix(fix: &GeneratedFix) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(fix)
}

pub fn decode_fix(bytes: &[u8]) -> Result<GeneratedFix, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{NodeId, Severity};

    fn issue(ctx: &[(&str, &str)]) -> DetectedIssue {
        ctx.iter().fold(
            DetectedIssue::new("network.dns", Severity::High, "lookup failed").with_error("REFUSED"),
            |issue, (k, v)| issue.with_context(*k, *v),
        )
    }

    #[test]
    fn test_common_context_intersection() {
        let a = issue(&[("resolver", "10.0.0.1"), ("iface", "wlan0")]);
        let b = issue(&[("resolver", "10.0.0.1"), ("iface", "eth0")]);
        let c = issue(&[("resolver", "10.0.0.1")]);
        let common = common_context(&[&a, &b, &c]);
        assert_eq!(common.len(), 1);
        assert_eq!(common["resolver"], "10.0.0.1");
    }

    #[test]
    fn test_synthesize_builds_config_change() {
        let a = issue(&[("resolver", "10.0.0.1")]);
        let draft = synthesize(&a, &[&a, &a, &a], 3).unwrap();
        assert_eq!(draft.kind, FixKind::ConfigChange);
        assert_eq!(draft.confidence, 60);

        let payload: Value = serde_json::from_str(&draft.payload).unwrap();
        assert_eq!(payload["self_healing"]["network.dns"]["avoid"]["resolver"], "10.0.0.1");
    }

    #[test]
    fn test_synthesize_caps_confidence() {
        let a = issue(&[("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(synthesize(&a, &[&a], 20).unwrap().confidence, SYNTHESIS_CONFIDENCE_CAP);
        assert_eq!(synthesize(&a, &[&a], u32::MAX).unwrap().confidence, SYNTHESIS_CONFIDENCE_CAP);
    }

    #[test]
    fn test_nothing_in_common() {
        let a = issue(&[("iface", "wlan0")]);
        let b = issue(&[("iface", "eth0")]);
        assert!(synthesize(&a, &[&a, &b], 3).is_none());
    }

    #[test]
    fn test_fix_encoding_keeps_signature() {
        let fix = GeneratedFix {
            id: "f1".into(),
            issue_id: "i1".into(),
            category: "network.dns".into(),
            description: "d".into(),
            kind: FixKind::MethodFallback,
            payload: "static-ip".into(),
            confidence_score: 65,
            tested_locally: true,
            test_passed: true,
            generated_by: NodeId::new("node-a"),
            generated_at: 7,
            signature: vec![0, 255, 7],
        };
        assert_eq!(decode_fix(&encode_fix(&fix).unwrap()).unwrap(), fix);
    }
}
