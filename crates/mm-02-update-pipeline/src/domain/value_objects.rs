//! Value objects for the update pipeline.

use std::cmp::Ordering;
use std::fmt;

use shared_types::NodeId;

/// Envelopes may be stamped at most this far in the future.
pub const DEFAULT_MAX_FUTURE_SKEW_SECS: u64 = 5 * 60;
/// Maximum envelope age accepted for relay.
pub const DEFAULT_DISSEMINATION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
/// Maximum envelope age accepted for installation.
pub const DEFAULT_DEPLOYMENT_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;
/// Hard cap on payload size (100 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 100 * 1024 * 1024;
/// Smallest payload with any structure (`{}`).
pub const DEFAULT_MIN_PAYLOAD_BYTES: u64 = 2;

/// Substrings that mark shell or script execution. Matched case-insensitively.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "<script",
    "javascript:",
    "eval(",
    "exec(",
    "system(",
    "rm -rf",
    "/bin/sh",
    "/bin/bash",
    "cmd.exe",
    "powershell",
    "drop table",
    "mkfs",
    ":(){",
];

/// Which acceptance window an integrity check applies.
///
/// Relaying an envelope is cheaper than installing it, so the two levels
/// use different maximum ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    Dissemination,
    Deployment,
}

/// Freshness bounds on `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessWindow {
    pub max_future_skew_secs: u64,
    pub dissemination_max_age_secs: u64,
    pub deployment_max_age_secs: u64,
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self {
            max_future_skew_secs: DEFAULT_MAX_FUTURE_SKEW_SECS,
            dissemination_max_age_secs: DEFAULT_DISSEMINATION_MAX_AGE_SECS,
            deployment_max_age_secs: DEFAULT_DEPLOYMENT_MAX_AGE_SECS,
        }
    }
}

impl FreshnessWindow {
    pub fn max_age(&self, level: VerificationLevel) -> u64 {
        match level {
            VerificationLevel::Dissemination => self.dissemination_max_age_secs,
            VerificationLevel::Deployment => self.deployment_max_age_secs,
        }
    }
}

/// Prefix / allow-list origin trust.
///
/// With both lists empty every non-empty origin is admitted and the
/// signature check alone decides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustPolicy {
    pub trusted_origin_prefixes: Vec<String>,
    pub trusted_origins: Vec<NodeId>,
}

impl TrustPolicy {
    pub fn admits(&self, origin: &NodeId) -> bool {
        if origin.is_empty() {
            return false;
        }
        if self.trusted_origin_prefixes.is_empty() && self.trusted_origins.is_empty() {
            return true;
        }
        self.trusted_origins.contains(origin)
            || self
                .trusted_origin_prefixes
                .iter()
                .any(|prefix| origin.as_str().starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityPolicy {
    pub freshness: FreshnessWindow,
    pub trust: TrustPolicy,
}

/// Bounds used by the category-independent sandbox tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLimits {
    pub min_payload_bytes: u64,
    pub max_payload_bytes: u64,
    pub denylist: Vec<String>,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            min_payload_bytes: DEFAULT_MIN_PAYLOAD_BYTES,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub integrity: IntegrityPolicy,
    pub sandbox: SandboxLimits,
    /// Finished pipeline states kept for `state_of` queries.
    pub stage_retention: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            integrity: IntegrityPolicy::default(),
            sandbox: SandboxLimits::default(),
            stage_retention: 4_096,
        }
    }
}

/// A dotted numeric version such as `1.0.0` or `v2.3`.
///
/// Missing components compare as zero, so `1.0` equals `1.0.0`. A
/// pre-release or build suffix (`-rc1`, `+build`) is ignored.
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        if core.is_empty() {
            return None;
        }
        let parts = core
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { parts })
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        f.write_str(&joined.join("."))
    }
}
