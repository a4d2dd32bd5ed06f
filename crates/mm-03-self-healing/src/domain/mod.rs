//! Domain layer for the self-healing pipeline.

mod entities;
mod issue_log;
mod services;
mod templates;
mod validation;
mod value_objects;

pub use entities::*;
pub use issue_log::*;
pub use services::*;
pub use templates::*;
pub use validation::*;
pub use value_objects::*;
