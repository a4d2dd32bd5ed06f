//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (Adapters)                          │
//! │  KeyringSigner, LoopbackMesh, FsContentStore, LocalFixExecutor ...  │
//! │                              ↑ implements ↑                         │
//! │                    MIDDLE LAYER (Ports)                             │
//! │  EnvelopeTransport, PayloadFetcher, OriginVerifier, FixExecutor ... │
//! │                              ↑ uses ↑                               │
//! │                    INNER LAYER (Domain)                             │
//! │  mm-01 relay rules, mm-02 stages and sandbox, mm-03 fix matching    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `signing`: Ed25519 signer and keyring-backed verifier
//! - `transport`: in-process mesh (send and payload fetch)
//! - `fs_store`: filesystem content store
//! - `relay`: per-category relay verifiers for the dissemination engine
//! - `healing`: fix broadcaster and local fix executor

pub mod fs_store;
pub mod healing;
pub mod relay;
pub mod signing;
pub mod transport;

pub use fs_store::FsContentStore;
pub use healing::{FixBroadcastAdapter, LocalFixExecutor, StagedPatch, FIX_ENVELOPE_VERSION};
pub use relay::{HealingRelayVerifier, PipelineRelayVerifier};
pub use signing::{KeyringSigner, KeyringVerifier};
pub use transport::LoopbackMesh;
