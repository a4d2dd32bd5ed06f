//! Self-healing entities.

use shared_types::FixKind;

use super::value_objects::PatternKey;

/// A known remedy for a fault, matched on exact category and an error
/// substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixTemplate {
    pub category: String,
    /// Matched case-insensitively against the issue's error message.
    pub error_substring: String,
    pub kind: FixKind,
    pub description: String,
    pub payload: String,
    pub confidence: u8,
}

/// Occurrence tracking for one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRecord {
    pub key: PatternKey,
    pub occurrences: u32,
    pub first_seen: u64,
    pub last_seen: u64,
    /// Fix already produced for this pattern, if any.
    pub fix_id: Option<String>,
}

/// A fix before it is stamped and signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixDraft {
    pub kind: FixKind,
    pub description: String,
    pub payload: String,
    pub confidence: u8,
}

impl From<&FixTemplate> for FixDraft {
    fn from(template: &FixTemplate) -> Self {
        Self {
            kind: template.kind,
            description: template.description.clone(),
            payload: template.payload.clone(),
            confidence: template.confidence,
        }
    }
}

/// Self-healing counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealingStats {
    pub issues_stored: usize,
    pub patterns_tracked: usize,
    pub fixes_generated: u64,
    pub fixes_received: u64,
    pub fixes_applied: u64,
    pub fixes_rejected: u64,
    /// Peer fix envelopes that failed loading or verification.
    pub fixes_refused: u64,
    pub awaiting_operator: u64,
    pub fixes_disseminated: u64,
}
