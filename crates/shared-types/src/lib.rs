//! # Shared Types Crate
//!
//! This crate contains the mesh data model shared by every subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Canonical Signing**: The signed bytes of an envelope are produced in one
//!   place (`UpdateEnvelope::signing_payload`) and nowhere else.
//! - **Ports, not effects**: Storage and time are traits; adapters live in
//!   the node runtime.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod fetch;
pub mod store;
pub mod time;
pub mod wire;

pub use entities::*;
pub use envelope::UpdateEnvelope;
pub use errors::*;
pub use fetch::{fetch_plan, FetchSource, PayloadFetcher};
pub use store::{ContentStore, InMemoryContentStore};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
