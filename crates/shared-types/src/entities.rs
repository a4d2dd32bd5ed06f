//! # Core Domain Entities
//!
//! Defines the mesh entities exchanged between subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`
//! - **Updates**: `UpdateCategory` (the envelope itself lives in `envelope`)
//! - **Self-Healing**: `DetectedIssue`, `Severity`, `GeneratedFix`, `FixKind`
//! - **Verification**: `SandboxTestResult`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Unique identifier for a node in the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// CLUSTER B: UPDATES
// =============================================================================

/// The kind of content an update envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdateCategory {
    BinaryPatch,
    ModelWeights,
    Configuration,
    BlockedList,
    PortalAssets,
    /// A self-healing fix produced by another node.
    Fix,
}

impl UpdateCategory {
    pub const ALL: [UpdateCategory; 6] = [
        UpdateCategory::BinaryPatch,
        UpdateCategory::ModelWeights,
        UpdateCategory::Configuration,
        UpdateCategory::BlockedList,
        UpdateCategory::PortalAssets,
        UpdateCategory::Fix,
    ];

    /// Stable name used in the canonical signing string.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateCategory::BinaryPatch => "BinaryPatch",
            UpdateCategory::ModelWeights => "ModelWeights",
            UpdateCategory::Configuration => "Configuration",
            UpdateCategory::BlockedList => "BlockedList",
            UpdateCategory::PortalAssets => "PortalAssets",
            UpdateCategory::Fix => "Fix",
        }
    }

    pub fn is_fix(&self) -> bool {
        matches!(self, UpdateCategory::Fix)
    }
}

impl fmt::Display for UpdateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLUSTER C: SELF-HEALING
// =============================================================================

/// Severity of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A problem observed on a node.
///
/// `category` is a free-form dotted name such as `network.dns` or
/// `update-failure`. `context` holds structured key/value observations
/// that fix synthesis intersects across occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssue {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub error_detail: Option<String>,
    pub context: BTreeMap<String, String>,
    pub detected_by: NodeId,
    pub detected_at: u64,
    pub proposed_fix_id: Option<String>,
}

impl DetectedIssue {
    /// Creates an issue with no id, reporter or timestamp.
    ///
    /// The self-healing service stamps those when the issue is reported.
    pub fn new(category: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            category: category.into(),
            severity,
            description: description.into(),
            error_detail: None,
            context: BTreeMap::new(),
            detected_by: NodeId::default(),
            detected_at: 0,
            proposed_fix_id: None,
        }
    }

    pub fn with_error(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The text used for pattern matching: the error detail when present,
    /// otherwise the description.
    pub fn error_message(&self) -> &str {
        self.error_detail.as_deref().unwrap_or(&self.description)
    }
}

/// What a fix does when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixKind {
    ConfigChange,
    MethodFallback,
    CommandExecution,
    DriverUpdate,
    FeatureDisable,
    CodePatch,
    Manual,
}

impl FixKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixKind::ConfigChange => "ConfigChange",
            FixKind::MethodFallback => "MethodFallback",
            FixKind::CommandExecution => "CommandExecution",
            FixKind::DriverUpdate => "DriverUpdate",
            FixKind::FeatureDisable => "FeatureDisable",
            FixKind::CodePatch => "CodePatch",
            FixKind::Manual => "Manual",
        }
    }
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remediation produced for a detected issue.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFix {
    pub id: String,
    pub issue_id: String,
    /// Category of the issue this fix addresses.
    pub category: String,
    pub description: String,
    pub kind: FixKind,
    /// Kind-specific body: JSON for config changes, a command line for
    /// command execution, free text otherwise.
    pub payload: String,
    /// 0..=100
    pub confidence_score: u8,
    pub tested_locally: bool,
    pub test_passed: bool,
    pub generated_by: NodeId,
    pub generated_at: u64,
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
}

impl GeneratedFix {
    /// Bytes covered by the generator's signature.
    ///
    /// Local test flags are excluded; they are set after signing and are
    /// re-derived by every receiving node.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.id,
            self.issue_id,
            self.category,
            self.kind,
            self.confidence_score,
            self.generated_by,
            self.payload
        )
        .into_bytes()
    }
}

// =============================================================================
// CLUSTER D: VERIFICATION
// =============================================================================

/// Outcome of running the sandbox battery against one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxTestResult {
    /// Envelope id the battery ran against.
    pub subject_id: String,
    pub started_at: u64,
    pub finished_at: u64,
    pub tests_run: u32,
    pub tests_passed: u32,
    pub passed: bool,
    /// Name of the first failing test and its reason.
    pub failure: Option<String>,
}
