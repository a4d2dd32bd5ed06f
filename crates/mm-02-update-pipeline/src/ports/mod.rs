//! Ports for the update pipeline.

pub mod inbound;
pub mod outbound;
