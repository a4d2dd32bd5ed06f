//! # Domain Layer for Dissemination
//!
//! Pure relay logic with no I/O. This is the innermost layer of the
//! hexagonal architecture.
//!
//! ## Contents
//!
//! - **entities**: `PeerRecord`, `PropagationReport`
//! - **value_objects**: Configuration and shared state (`DisseminationConfig`,
//!   `SeenSet`, `PeerSet`, `DisseminationMetrics`)
//! - **services**: Fan-out target selection
//! - **invariants**: Relay invariant checks (hop bound, path shape)

mod entities;
mod invariants;
mod services;
mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
