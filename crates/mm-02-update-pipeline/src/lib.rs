//! # Update Verification & Application Pipeline (mm-02)
//!
//! Takes an envelope accepted by dissemination and decides whether this node
//! installs it.
//!
//! ## Stages
//!
//! `Received → Verifying → Downloading → HashChecking → SandboxTesting →
//! Applying → Applied | Rejected(stage)`
//!
//! ## Failure Taxonomy
//!
//! | Error | When |
//! |-------|------|
//! | `RejectedStale` | `created_at` outside the freshness window |
//! | `RejectedUntrusted` | origin policy or signature failure |
//! | `RejectedCorrupt` | malformed envelope or hash mismatch |
//! | `RejectedUnsafe` | a sandbox test failed |
//! | `FetchFailed` | no source produced the payload |
//! | `ApplyFailed` | persistence or the category applier failed |
//!
//! Every outcome is published on the event bus; none is fatal to the node.

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::sandbox::{SandboxBattery, SandboxSubject, SandboxTest, SandboxVerdict};
pub use domain::*;
pub use events::{ApplyError, PipelineError, PipelineOutcome};
pub use ports::inbound::UpdatePipelineApi;
pub use ports::outbound::{CategoryApplier, OriginVerifier, PipelinePorts};
pub use service::UpdatePipelineService;
