//! # Event Handlers
//!
//! Long-running bus consumers that connect the subsystems of one node.
//!
//! - `envelope_router`: accepted envelopes → update pipeline or self-healing
//! - `failure_feedback`: pipeline failures → self-healing issues

pub mod envelope_router;
pub mod failure_feedback;

pub use envelope_router::EnvelopeRouter;
pub use failure_feedback::{
    failure_issue, fix_refusal_issue, FailureFeedbackHandler, FIX_INTAKE_STAGE, UPDATE_FAILURE_CATEGORY,
};
