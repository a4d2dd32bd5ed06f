//! # Dissemination Subsystem (mm-01)
//!
//! Spreads signed update envelopes across the mesh using epidemic gossip.
//! Each node forwards a newly accepted envelope to a small random subset of
//! its peers, so an update reaches the whole mesh in a logarithmic number of
//! rounds without any coordinator.
//!
//! ## Architecture Role
//!
//! ```text
//! [Peer] ──receive_envelope──→ [Dissemination (1)] ──EnvelopeReceived──→ [Pipeline (2)]
//!                                      │                             └─→ [Self-Healing (3)]
//!                                      ↓ gossip (fanout=3)
//!                              ┌───────┴───────┐
//!                              ↓               ↓
//!                          [Peer A]        [Peer B] ...
//! ```
//!
//! ## Relay Rules
//!
//! - An envelope id is accepted at most once per node (seen set)
//! - Envelopes at or beyond the hop limit are dropped
//! - Every envelope passes its category verifier before it is relayed
//! - Nodes already on the propagation path are never sent the envelope again

pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::*;
pub use events::{DisseminationError, ReceiveOutcome};
pub use ports::inbound::{BroadcastRequest, DisseminationApi};
pub use ports::outbound::{DisseminationPorts, EnvelopeSigner, EnvelopeTransport, EnvelopeVerifier};
pub use service::DisseminationService;
