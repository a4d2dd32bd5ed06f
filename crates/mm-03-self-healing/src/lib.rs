//! # Self-Healing (mm-03)
//!
//! Turns locally observed issues into fixes and takes fixes from peers.
//!
//! ## Fix sources
//!
//! 1. A template whose category equals the issue category and whose error
//!    substring occurs in the issue's error message.
//! 2. Synthesis: once a pattern (category, error hash, severity) repeats
//!    `synthesis_threshold` times, the context shared by the recent issues
//!    of that category becomes a configuration change.
//!
//! ## Validation by kind
//!
//! | Kind | Rule |
//! |------|------|
//! | `ConfigChange` | payload must parse as JSON |
//! | `MethodFallback` | always |
//! | `CommandExecution` | confidence >= 80 |
//! | `DriverUpdate` | advisory, operator decides |
//! | `FeatureDisable` | confidence >= 70 |
//! | `CodePatch` | confidence >= 90 |
//! | `Manual` | operator only |
//!
//! Peer fixes below `acceptance_floor` are rejected before validation.

pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::*;
pub use events::{HealingError, IncomingFixOutcome};
pub use ports::inbound::SelfHealingApi;
pub use ports::outbound::{FixBroadcaster, FixExecutor, FixSigner, FixVerifier, HealingPorts};
pub use service::SelfHealingService;
