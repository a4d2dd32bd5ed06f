//! # Node Configuration
//!
//! One TOML document with a section per subsystem. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file (`MESH_CONFIG` or the first CLI argument)
//! 3. Environment: `MESH_NODE_ID`, `MESH_SIGNING_SEED`, `MESH_FANOUT`,
//!    `MESH_MAX_HOPS`, `MESH_DATA_DIR`

use std::path::{Path, PathBuf};

use mm_01_dissemination::DisseminationConfig;
use mm_02_update_pipeline::{
    FreshnessWindow, IntegrityPolicy, PipelineConfig, SandboxLimits, TrustPolicy,
    DEFAULT_DENYLIST,
};
use mm_03_self_healing::HealingConfig;
use serde::{Deserialize, Serialize};
use shared_types::NodeId;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid TOML: {0}")]
    Parse(String),

    #[error("Invalid value {value:?} for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    pub dissemination: DisseminationSection,
    pub pipeline: PipelineSection,
    pub healing: HealingSection,
    pub storage: StorageConfig,
    pub bus: BusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub node_id: String,
    /// Hex Ed25519 seed. A fresh key is generated when absent.
    pub signing_seed: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            node_id: "mesh-node".to_string(),
            signing_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisseminationSection {
    pub fanout: usize,
    pub max_hops: u32,
    pub seen_capacity: usize,
    pub peer_capacity: usize,
    /// Peers known at startup.
    pub peers: Vec<String>,
}

impl Default for DisseminationSection {
    fn default() -> Self {
        let defaults = DisseminationConfig::default();
        Self {
            fanout: defaults.fanout,
            max_hops: defaults.max_hops,
            seen_capacity: defaults.seen_capacity,
            peer_capacity: defaults.peer_capacity,
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub max_future_skew_secs: u64,
    pub dissemination_max_age_secs: u64,
    pub deployment_max_age_secs: u64,
    pub min_payload_bytes: u64,
    pub max_payload_bytes: u64,
    pub denylist: Vec<String>,
    pub trusted_origin_prefixes: Vec<String>,
    pub trusted_origins: Vec<String>,
    pub stage_retention: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let freshness = FreshnessWindow::default();
        let sandbox = SandboxLimits::default();
        Self {
            max_future_skew_secs: freshness.max_future_skew_secs,
            dissemination_max_age_secs: freshness.dissemination_max_age_secs,
            deployment_max_age_secs: freshness.deployment_max_age_secs,
            min_payload_bytes: sandbox.min_payload_bytes,
            max_payload_bytes: sandbox.max_payload_bytes,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            trusted_origin_prefixes: Vec::new(),
            trusted_origins: Vec::new(),
            stage_retention: PipelineConfig::default().stage_retention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingSection {
    pub synthesis_threshold: u32,
    pub synthesis_window: usize,
    pub acceptance_floor: u8,
    pub issue_retention: usize,
    pub max_fix_age_secs: u64,
    /// Programs a `CommandExecution` fix may start. Empty refuses all.
    pub command_allowlist: Vec<String>,
}

impl Default for HealingSection {
    fn default() -> Self {
        let defaults = HealingConfig::default();
        Self {
            synthesis_threshold: defaults.synthesis_threshold,
            synthesis_window: defaults.synthesis_window,
            acceptance_floor: defaults.acceptance_floor,
            issue_retention: defaults.issue_retention,
            max_fix_age_secs: defaults.max_fix_age_secs,
            command_allowlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Keep payloads in memory instead of under `data_dir`.
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Defaults, then the file at `path` if given, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Applies `MESH_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(node_id) = lookup("MESH_NODE_ID") {
            self.identity.node_id = node_id;
        }
        if let Some(seed) = lookup("MESH_SIGNING_SEED") {
            self.identity.signing_seed = Some(seed);
        }
        if let Some(value) = lookup("MESH_FANOUT") {
            self.dissemination.fanout = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { var: "MESH_FANOUT", value })?;
        }
        if let Some(value) = lookup("MESH_MAX_HOPS") {
            self.dissemination.max_hops = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { var: "MESH_MAX_HOPS", value })?;
        }
        if let Some(dir) = lookup("MESH_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let node_id = self.identity.node_id.trim();
        if node_id.is_empty() {
            return Err(ConfigError::Invalid("identity.node_id is empty".into()));
        }
        // Node ids appear in payload locators and signing strings.
        if node_id.contains('/') || node_id.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "identity.node_id {:?} may not contain '/' or ':'",
                node_id
            )));
        }
        if self.dissemination.fanout == 0 {
            return Err(ConfigError::Invalid("dissemination.fanout must be at least 1".into()));
        }
        if self.dissemination.max_hops == 0 {
            return Err(ConfigError::Invalid("dissemination.max_hops must be at least 1".into()));
        }
        if self.pipeline.dissemination_max_age_secs > self.pipeline.deployment_max_age_secs {
            return Err(ConfigError::Invalid(
                "pipeline.dissemination_max_age_secs exceeds deployment_max_age_secs".into(),
            ));
        }
        if self.pipeline.min_payload_bytes > self.pipeline.max_payload_bytes {
            return Err(ConfigError::Invalid(
                "pipeline.min_payload_bytes exceeds max_payload_bytes".into(),
            ));
        }
        if self.healing.acceptance_floor > 100 {
            return Err(ConfigError::Invalid("healing.acceptance_floor is above 100".into()));
        }
        Ok(())
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.identity.node_id.trim())
    }

    pub fn dissemination_config(&self) -> DisseminationConfig {
        DisseminationConfig {
            fanout: self.dissemination.fanout,
            max_hops: self.dissemination.max_hops,
            seen_capacity: self.dissemination.seen_capacity,
            peer_capacity: self.dissemination.peer_capacity,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            integrity: IntegrityPolicy {
                freshness: FreshnessWindow {
                    max_future_skew_secs: p.max_future_skew_secs,
                    dissemination_max_age_secs: p.dissemination_max_age_secs,
                    deployment_max_age_secs: p.deployment_max_age_secs,
                },
                trust: TrustPolicy {
                    trusted_origin_prefixes: p.trusted_origin_prefixes.clone(),
                    trusted_origins: p.trusted_origins.iter().map(NodeId::new).collect(),
                },
            },
            sandbox: SandboxLimits {
                min_payload_bytes: p.min_payload_bytes,
                max_payload_bytes: p.max_payload_bytes,
                denylist: p.denylist.clone(),
            },
            stage_retention: p.stage_retention,
        }
    }

    pub fn healing_config(&self) -> HealingConfig {
        HealingConfig {
            synthesis_threshold: self.healing.synthesis_threshold,
            synthesis_window: self.healing.synthesis_window,
            acceptance_floor: self.healing.acceptance_floor,
            issue_retention: self.healing.issue_retention,
            max_future_skew_secs: self.pipeline.max_future_skew_secs,
            max_fix_age_secs: self.healing.max_fix_age_secs,
            ..HealingConfig::default()
        }
    }

    /// In-memory configuration for a node of an in-process mesh.
    pub fn in_memory(node_id: &str) -> Self {
        let mut config = Self::default();
        config.identity.node_id = node_id.to_string();
        config.storage.in_memory = true;
        config
    }
}
