//! Domain layer for the update pipeline.

mod entities;
mod integrity;
pub mod sandbox;
mod tracking;
mod value_objects;

pub use entities::*;
pub use integrity::*;
pub use tracking::*;
pub use value_objects::*;
