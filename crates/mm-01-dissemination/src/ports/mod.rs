//! Ports (hexagonal boundaries) for the dissemination subsystem.

pub mod inbound;
pub mod outbound;
