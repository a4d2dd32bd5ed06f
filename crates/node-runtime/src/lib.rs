//! # Node Runtime Library
//!
//! Wires the MeshMend subsystems into a running node. The `mesh-node`
//! binary is the main entry point; the library is exposed for the
//! integration tests.
//!
//! ## Architectural Patterns
//!
//! - **EDA (Event-Driven Architecture)**: Subsystems communicate via the event bus
//! - **Hexagonal Architecture**: Ports define contracts, adapters implement them
//! - **Dependency Injection**: The container builds every adapter and service

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{ConfigError, ContainerError, NodeConfig, SubsystemContainer};
pub use runtime::NodeRuntime;
