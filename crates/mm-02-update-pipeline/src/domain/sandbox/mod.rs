//! # Sandbox Test Battery
//!
//! An ordered list of safety checks run against a fetched payload before it
//! is installed. Category-independent tests run first, then the tests
//! registered for the envelope's category. The first failure stops the
//! battery and becomes the reported reason.
//!
//! Tests are synchronous and CPU-bound; the service runs the battery on the
//! blocking pool.

mod category;
mod common;

use std::collections::HashMap;
use std::sync::Arc;

use shared_types::{SandboxTestResult, TimeSource, UpdateCategory, UpdateEnvelope};

pub use category::{
    parse_asset_manifest, parse_blocklist, AssetManifestCheck, BinaryHeaderCheck,
    BlocklistFormatCheck, ConfigSchemaCheck, ExecutionProbe, InferenceSmokeCheck, ModelFormat,
    ModelFormatCheck,
};
pub use common::{
    CompatibilityCheck, MaliciousPatternScan, MaximumSize, MinimumLength, RollbackCapability,
};

use super::value_objects::SandboxLimits;

/// Everything a test may look at.
#[derive(Debug, Clone)]
pub struct SandboxSubject {
    pub envelope: UpdateEnvelope,
    pub payload: Arc<Vec<u8>>,
    /// Version currently installed for this category.
    pub applied_version: Option<String>,
    /// Whether the category applier can snapshot its current state.
    pub rollback_available: bool,
}

/// One check in the battery.
pub trait SandboxTest: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` carries a short human reason.
    fn run(&self, subject: &SandboxSubject) -> Result<(), String>;
}

/// Result of a battery run.
#[derive(Debug, Clone)]
pub struct SandboxVerdict {
    pub result: SandboxTestResult,
    /// `(test name, reason)` of the first failure.
    pub failed_test: Option<(String, String)>,
}

/// Tests to run, keyed on category.
#[derive(Default, Clone)]
pub struct SandboxBattery {
    common: Vec<Arc<dyn SandboxTest>>,
    by_category: HashMap<UpdateCategory, Vec<Arc<dyn SandboxTest>>>,
}

impl SandboxBattery {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full default battery.
    pub fn standard(limits: &SandboxLimits) -> Self {
        let mut battery = Self::empty();
        battery.push_common(Arc::new(MinimumLength::new(limits.min_payload_bytes)));
        battery.push_common(Arc::new(MaximumSize::new(limits.max_payload_bytes)));
        battery.push_common(Arc::new(MaliciousPatternScan::new(limits.denylist.clone())));
        battery.push_common(Arc::new(CompatibilityCheck));
        battery.push_common(Arc::new(RollbackCapability));

        battery.register(UpdateCategory::BinaryPatch, Arc::new(BinaryHeaderCheck));
        battery.register(UpdateCategory::BinaryPatch, Arc::new(ExecutionProbe));
        battery.register(UpdateCategory::ModelWeights, Arc::new(ModelFormatCheck));
        battery.register(UpdateCategory::ModelWeights, Arc::new(InferenceSmokeCheck));
        battery.register(UpdateCategory::Configuration, Arc::new(ConfigSchemaCheck::default()));
        battery.register(UpdateCategory::BlockedList, Arc::new(BlocklistFormatCheck));
        battery.register(UpdateCategory::PortalAssets, Arc::new(AssetManifestCheck));
        battery
    }

    pub fn push_common(&mut self, test: Arc<dyn SandboxTest>) {
        self.common.push(test);
    }

    pub fn register(&mut self, category: UpdateCategory, test: Arc<dyn SandboxTest>) {
        self.by_category.entry(category).or_default().push(test);
    }

    /// Test names for `category`, in run order.
    pub fn plan(&self, category: UpdateCategory) -> Vec<&'static str> {
        self.tests_for(category).map(|t| t.name()).collect()
    }

    fn tests_for(&self, category: UpdateCategory) -> impl Iterator<Item = &Arc<dyn SandboxTest>> {
        self.common
            .iter()
            .chain(self.by_category.get(&category).into_iter().flatten())
    }

    pub fn run(&self, subject: &SandboxSubject, time: &dyn TimeSource) -> SandboxVerdict {
        let started_at = time.now();
        let mut tests_run = 0u32;
        let mut tests_passed = 0u32;
        let mut failed_test = None;

        for test in self.tests_for(subject.envelope.category) {
            tests_run += 1;
            match test.run(subject) {
                Ok(()) => tests_passed += 1,
                Err(reason) => {
                    failed_test = Some((test.name().to_string(), reason));
                    break;
                }
            }
        }

        let failure = failed_test
            .as_ref()
            .map(|(name, reason)| format!("{}: {}", name, reason));
        SandboxVerdict {
            result: SandboxTestResult {
                subject_id: subject.envelope.id.clone(),
                started_at,
                finished_at: time.now(),
                tests_run,
                tests_passed,
                passed: failed_test.is_none(),
                failure,
            },
            failed_test,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use shared_crypto::content_digest;
    use shared_types::NodeId;

    pub fn subject(category: UpdateCategory, payload: &[u8]) -> SandboxSubject {
        SandboxSubject {
            envelope: UpdateEnvelope {
                id: "env-1".into(),
                version: "1.0.0".into(),
                category,
                created_at: 0,
                payload_hash: content_digest(payload),
                signature: vec![1; 64],
                origin_node_id: NodeId::new("node-a"),
                hop_count: 0,
                propagation_path: vec![NodeId::new("node-a")],
                payload_size_bytes: payload.len() as u64,
                payload_locator: None,
                notes: None,
            },
            payload: Arc::new(payload.to_vec()),
            applied_version: None,
            rollback_available: true,
        }
    }
}
