//! Value objects for the self-healing pipeline.

use shared_crypto::pattern_key;
use shared_types::{DetectedIssue, Severity};

/// Self-healing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealingConfig {
    /// Occurrences of one pattern before synthesis is attempted.
    pub synthesis_threshold: u32,
    /// Recent same-category issues intersected during synthesis.
    pub synthesis_window: usize,
    /// Minimum confidence for fixes received from peers.
    pub acceptance_floor: u8,
    pub issue_retention: usize,
    pub pattern_capacity: usize,
    /// Remembered fix and envelope ids, for duplicate suppression.
    pub handled_capacity: usize,
    pub max_future_skew_secs: u64,
    pub max_fix_age_secs: u64,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            synthesis_threshold: 3,
            synthesis_window: 10,
            acceptance_floor: 50,
            issue_retention: 1_000,
            pattern_capacity: 10_000,
            handled_capacity: 10_000,
            max_future_skew_secs: 5 * 60,
            max_fix_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Groups repeated occurrences of the same fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub category: String,
    pub message_hash: String,
    pub severity: Severity,
}

impl PatternKey {
    pub fn of(issue: &DetectedIssue) -> Self {
        Self {
            category: issue.category.clone(),
            message_hash: pattern_key(&[issue.error_message().trim()]),
            severity: issue.severity,
        }
    }
}

/// How a fix kind is checked before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// The payload must parse as JSON.
    StructuredPayload,
    Always,
    MinConfidence(u8),
    /// Surfaced to the operator, never executed.
    AdvisoryOnly,
    /// Always left for the operator.
    OperatorOnly,
}

/// Result of validating one fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    AutoApply,
    Advisory,
    OperatorRequired,
    Rejected(String),
}

impl Verdict {
    pub fn needs_operator(&self) -> bool {
        matches!(self, Verdict::Advisory | Verdict::OperatorRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_key_groups_same_message() {
        let a = DetectedIssue::new("network.dns", Severity::High, "x").with_error("SERVFAIL");
        let b = DetectedIssue::new("network.dns", Severity::High, "y").with_error("SERVFAIL ");
        let c = DetectedIssue::new("network.dns", Severity::Low, "z").with_error("SERVFAIL");
        assert_eq!(PatternKey::of(&a), PatternKey::of(&b));
        assert_ne!(PatternKey::of(&a), PatternKey::of(&c));
    }
}
