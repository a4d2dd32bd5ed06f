//! # Subsystem Container
//!
//! Central container holding one node's subsystem instances with their
//! adapters injected.
//!
//! - Subsystems initialized in dependency order (mm-01 → mm-02 → mm-03)
//! - Subsystems talk through the event bus or narrow adapters, never to
//!   each other's services

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig};
pub use subsystems::{ContainerError, SubsystemContainer};
