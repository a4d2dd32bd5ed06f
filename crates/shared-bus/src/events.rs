//! # Mesh Events
//!
//! Defines all event types that flow through the shared bus.
//!
//! Subsystem ids used as event sources:
//!
//! | Id | Subsystem |
//! |----|-----------|
//! | 0 | node runtime |
//! | 1 | dissemination |
//! | 2 | update pipeline |
//! | 3 | self-healing |

use serde::{Deserialize, Serialize};
use shared_types::{
    DetectedIssue, FixKind, GeneratedFix, NodeId, Rejection, SandboxTestResult, UpdateCategory,
    UpdateEnvelope,
};

/// Subsystem id of the node runtime.
pub const RUNTIME_SUBSYSTEM: u8 = 0;
/// Subsystem id of the dissemination engine.
pub const DISSEMINATION_SUBSYSTEM: u8 = 1;
/// Subsystem id of the update pipeline.
pub const PIPELINE_SUBSYSTEM: u8 = 2;
/// Subsystem id of the self-healing pipeline.
pub const SELF_HEALING_SUBSYSTEM: u8 = 3;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MeshEvent {
    // =========================================================================
    // SUBSYSTEM 1: DISSEMINATION
    // =========================================================================
    /// A peer joined the local peer set.
    PeerAdded(NodeId),

    /// A peer left the local peer set.
    PeerRemoved(NodeId),

    /// This node originated an envelope.
    EnvelopeBroadcast(UpdateEnvelope),

    /// An envelope passed relay checks and was accepted for the first time.
    /// Consumed by the update pipeline (non-fix categories) and by
    /// self-healing (fix category).
    EnvelopeReceived(UpdateEnvelope),

    /// An envelope failed relay verification and was dropped.
    EnvelopeRejected {
        envelope_id: String,
        origin: NodeId,
        rejection: Rejection,
    },

    // =========================================================================
    // SUBSYSTEM 2: UPDATE PIPELINE
    // =========================================================================
    /// The sandbox battery finished for a payload.
    SandboxCompleted(SandboxTestResult),

    /// An update was installed.
    UpdateApplied {
        envelope_id: String,
        category: UpdateCategory,
        version: String,
    },

    /// An update stopped at some stage and was not installed.
    /// Consumed by self-healing as an `update-failure` issue.
    UpdateFailed {
        envelope_id: String,
        category: UpdateCategory,
        version: String,
        stage: String,
        rejection: Rejection,
    },

    // =========================================================================
    // SUBSYSTEM 3: SELF-HEALING
    // =========================================================================
    /// A local issue was recorded.
    IssueReported(DetectedIssue),

    /// A fix was produced locally (template or synthesis).
    FixGenerated(GeneratedFix),

    /// A fix was applied on this node.
    FixApplied {
        fix_id: String,
        kind: FixKind,
        generated_by: NodeId,
    },

    /// A fix was refused.
    FixRejected { fix_id: String, reason: String },

    /// A fix envelope from a peer could not be loaded or verified, so no
    /// fix was ever decoded from it.
    FixRefused {
        envelope_id: String,
        origin: NodeId,
        rejection: Rejection,
    },

    /// A fix needs a human (manual or driver fixes).
    OperatorActionRequired {
        fix_id: String,
        kind: FixKind,
        description: String,
    },

    // =========================================================================
    // CRITICAL EVENTS (DLQ)
    // =========================================================================
    /// Critical error requiring operator attention.
    CriticalError {
        /// The subsystem that encountered the error.
        subsystem_id: u8,
        /// Error description.
        error: String,
    },
}

impl MeshEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PeerAdded(_) | Self::PeerRemoved(_) => EventTopic::Peers,
            Self::EnvelopeBroadcast(_) | Self::EnvelopeReceived(_) | Self::EnvelopeRejected { .. } => {
                EventTopic::Dissemination
            }
            Self::SandboxCompleted(_) | Self::UpdateApplied { .. } | Self::UpdateFailed { .. } => {
                EventTopic::Pipeline
            }
            Self::IssueReported(_)
            | Self::FixGenerated(_)
            | Self::FixApplied { .. }
            | Self::FixRejected { .. }
            | Self::FixRefused { .. }
            | Self::OperatorActionRequired { .. } => EventTopic::SelfHealing,
            Self::CriticalError { .. } => EventTopic::DeadLetterQueue,
        }
    }

    /// Get the originating subsystem ID.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::PeerAdded(_)
            | Self::PeerRemoved(_)
            | Self::EnvelopeBroadcast(_)
            | Self::EnvelopeReceived(_)
            | Self::EnvelopeRejected { .. } => DISSEMINATION_SUBSYSTEM,
            Self::SandboxCompleted(_) | Self::UpdateApplied { .. } | Self::UpdateFailed { .. } => {
                PIPELINE_SUBSYSTEM
            }
            Self::IssueReported(_)
            | Self::FixGenerated(_)
            | Self::FixApplied { .. }
            | Self::FixRejected { .. }
            | Self::FixRefused { .. }
            | Self::OperatorActionRequired { .. } => SELF_HEALING_SUBSYSTEM,
            Self::CriticalError { subsystem_id, .. } => *subsystem_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Peer set membership changes.
    Peers,
    /// Envelope relay events.
    Dissemination,
    /// Verification and application events.
    Pipeline,
    /// Issue and fix events.
    SelfHealing,
    /// Dead Letter Queue for critical errors.
    DeadLetterQueue,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Create a filter for events from specific subsystems.
    #[must_use]
    pub fn from_subsystems(subsystems: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &MeshEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        topic_match && source_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::UpdateFailure;

    fn rejected() -> MeshEvent {
        MeshEvent::EnvelopeRejected {
            envelope_id: "e1".into(),
            origin: NodeId::new("a"),
            rejection: Rejection::new(UpdateFailure::Untrusted, "bad signature"),
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(rejected().topic(), EventTopic::Dissemination);
        assert_eq!(rejected().source_subsystem(), DISSEMINATION_SUBSYSTEM);

        let event = MeshEvent::FixRejected {
            fix_id: "f".into(),
            reason: "low confidence".into(),
        };
        assert_eq!(event.topic(), EventTopic::SelfHealing);
        assert_eq!(event.source_subsystem(), SELF_HEALING_SUBSYSTEM);

        let refused = MeshEvent::FixRefused {
            envelope_id: "e2".into(),
            origin: NodeId::new("a"),
            rejection: Rejection::new(UpdateFailure::Corrupt, "payload hash mismatch"),
        };
        assert_eq!(refused.topic(), EventTopic::SelfHealing);
        assert_eq!(refused.source_subsystem(), SELF_HEALING_SUBSYSTEM);
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Pipeline]);
        assert!(!filter.matches(&rejected()));
        assert!(filter.matches(&MeshEvent::UpdateApplied {
            envelope_id: "e".into(),
            category: UpdateCategory::Configuration,
            version: "1.0.0".into(),
        }));
        assert!(EventFilter::topics(vec![EventTopic::All]).matches(&rejected()));
    }

    #[test]
    fn test_filter_by_subsystem() {
        let filter = EventFilter::from_subsystems(vec![RUNTIME_SUBSYSTEM]);
        assert!(filter.matches(&MeshEvent::CriticalError {
            subsystem_id: RUNTIME_SUBSYSTEM,
            error: "disk".into(),
        }));
        assert!(!filter.matches(&MeshEvent::PeerAdded(NodeId::new("b"))));
    }
}
