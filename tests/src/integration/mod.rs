//! Integration scenarios. Each file builds its own mesh.

pub mod support;

mod gossip;
mod healing;
mod pipeline;
