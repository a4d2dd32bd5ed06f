//! # Failure Feedback
//!
//! Turns `UpdateFailed` and `FixRefused` events into `update-failure`
//! issues, so an update that keeps failing the same way becomes a pattern
//! self-healing can act on.

use std::sync::Arc;

use mm_03_self_healing::SelfHealingApi;
use shared_bus::{MeshEvent, Subscription};
use shared_types::{DetectedIssue, NodeId, Rejection, Severity, UpdateCategory, UpdateFailure};
use tokio::sync::watch;
use tracing::{info, warn};

/// Issue category used for pipeline failures.
pub const UPDATE_FAILURE_CATEGORY: &str = "update-failure";

/// Stage name reported for fix envelopes refused before decoding.
pub const FIX_INTAKE_STAGE: &str = "fix-intake";

pub struct FailureFeedbackHandler {
    subscription: Subscription,
    healing: Arc<dyn SelfHealingApi>,
}

impl FailureFeedbackHandler {
    /// `subscription` should carry the pipeline and self-healing topics.
    pub fn new(subscription: Subscription, healing: Arc<dyn SelfHealingApi>) -> Self {
        Self {
            subscription,
            healing,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Failure feedback handler started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Failure feedback: shutdown signal received");
                    break;
                }
                event = self.subscription.recv() => match event {
                    Some(MeshEvent::UpdateFailed { category, version, stage, rejection, .. }) => {
                        let issue = failure_issue(category, &version, &stage, &rejection);
                        if let Err(e) = self.healing.report_issue(issue).await {
                            warn!(error = %e, "Failure feedback: issue not recorded");
                        }
                    }
                    Some(MeshEvent::FixRefused { envelope_id, origin, rejection }) => {
                        let issue = fix_refusal_issue(&envelope_id, &origin, &rejection);
                        if let Err(e) = self.healing.report_issue(issue).await {
                            warn!(error = %e, "Failure feedback: issue not recorded");
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
    }
}

/// Context keys are the stable parts of the failure, so repeated failures
/// of one category at one stage share them.
pub fn failure_issue(
    category: UpdateCategory,
    version: &str,
    stage: &str,
    rejection: &Rejection,
) -> DetectedIssue {
    DetectedIssue::new(
        UPDATE_FAILURE_CATEGORY,
        severity_of(rejection.failure),
        format!("{} update {} failed at {}", category, version, stage),
    )
    .with_error(format!("{}: {}", rejection.failure, rejection.detail))
    .with_context("update_category", category.as_str())
    .with_context("stage", stage)
    .with_context("failure", rejection.failure.as_str())
}

/// The envelope id stays out of the context so refusals from one origin
/// count as one pattern.
pub fn fix_refusal_issue(envelope_id: &str, origin: &NodeId, rejection: &Rejection) -> DetectedIssue {
    DetectedIssue::new(
        UPDATE_FAILURE_CATEGORY,
        severity_of(rejection.failure),
        format!("fix envelope {} from {} refused", envelope_id, origin),
    )
    .with_error(format!("{}: {}", rejection.failure, rejection.detail))
    .with_context("update_category", UpdateCategory::Fix.as_str())
    .with_context("stage", FIX_INTAKE_STAGE)
    .with_context("failure", rejection.failure.as_str())
    .with_context("origin", origin.as_str())
}

fn severity_of(failure: UpdateFailure) -> Severity {
    match failure {
        UpdateFailure::Unsafe | UpdateFailure::Untrusted | UpdateFailure::Corrupt => Severity::High,
        UpdateFailure::Stale | UpdateFailure::FetchFailed | UpdateFailure::ApplyFailed => {
            Severity::Medium
        }
    }
}
