//! Ports for the self-healing pipeline.

pub mod inbound;
pub mod outbound;
