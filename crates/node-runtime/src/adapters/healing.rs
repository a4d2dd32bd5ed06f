//! # Self-Healing Adapters
//!
//! - [`FixBroadcastAdapter`]: sends validated fixes out as Fix-category
//!   envelopes through the dissemination engine.
//! - [`LocalFixExecutor`]: carries out auto-applicable fixes on this node.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mm_01_dissemination::{BroadcastRequest, DisseminationApi};
use mm_02_update_pipeline::adapters::ConfigMerger;
use mm_03_self_healing::{FixBroadcaster, FixExecutor};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{FixKind, GeneratedFix, UpdateCategory};
use tracing::{info, warn};

/// Version stamped on fix envelopes; fixes are identified by id, not version.
pub const FIX_ENVELOPE_VERSION: &str = "1.0.0";

/// Commands started by fixes are killed after this long.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FixBroadcastAdapter {
    dissemination: Arc<dyn DisseminationApi>,
}

impl FixBroadcastAdapter {
    pub fn new(dissemination: Arc<dyn DisseminationApi>) -> Self {
        Self { dissemination }
    }
}

#[async_trait]
impl FixBroadcaster for FixBroadcastAdapter {
    async fn broadcast_fix(&self, fix: &GeneratedFix, payload: Vec<u8>) -> Result<String, String> {
        let envelope = self
            .dissemination
            .broadcast(BroadcastRequest {
                category: UpdateCategory::Fix,
                version: FIX_ENVELOPE_VERSION.to_string(),
                payload,
                notes: Some(format!("{}: {}", fix.kind, fix.description)),
            })
            .await
            .map_err(|e| e.to_string())?;
        Ok(envelope.id)
    }
}

/// A code patch waiting for the next maintenance window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPatch {
    pub fix_id: String,
    pub category: String,
    pub body: String,
}

/// Applies fixes to this node's state.
///
/// Configuration changes merge into the same document the update pipeline
/// maintains. Commands run only when their program is allowlisted.
pub struct LocalFixExecutor {
    config: Arc<ConfigMerger>,
    command_allowlist: Vec<String>,
    fallbacks: RwLock<BTreeMap<String, String>>,
    disabled: RwLock<BTreeSet<String>>,
    staged: RwLock<Vec<StagedPatch>>,
}

impl LocalFixExecutor {
    pub fn new(config: Arc<ConfigMerger>, command_allowlist: Vec<String>) -> Self {
        Self {
            config,
            command_allowlist,
            fallbacks: RwLock::new(BTreeMap::new()),
            disabled: RwLock::new(BTreeSet::new()),
            staged: RwLock::new(Vec::new()),
        }
    }

    /// Method selected for an issue category by a fallback fix.
    pub fn fallback_for(&self, category: &str) -> Option<String> {
        self.fallbacks.read().get(category).cloned()
    }

    pub fn is_disabled(&self, feature: &str) -> bool {
        self.disabled.read().contains(feature)
    }

    pub fn staged_patches(&self) -> Vec<StagedPatch> {
        self.staged.read().clone()
    }

    async fn run_command(&self, command_line: &str) -> Result<(), String> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or("empty command")?;
        if !self.command_allowlist.iter().any(|allowed| allowed == program) {
            return Err(format!("command {:?} is not allowlisted", program));
        }

        let mut command = tokio::process::Command::new(program);
        command.args(parts).kill_on_drop(true);
        let status = tokio::time::timeout(COMMAND_TIMEOUT, command.status())
            .await
            .map_err(|_| format!("{} timed out", program))?
            .map_err(|e| format!("{} failed to start: {}", program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {}", program, status))
        }
    }
}

#[async_trait]
impl FixExecutor for LocalFixExecutor {
    async fn execute(&self, fix: &GeneratedFix) -> Result<(), String> {
        match fix.kind {
            FixKind::ConfigChange => {
                let patch: Value =
                    serde_json::from_str(&fix.payload).map_err(|e| format!("bad config patch: {}", e))?;
                self.config.merge_patch(&patch).map_err(|e| e.to_string())?;
            }
            FixKind::MethodFallback => {
                self.fallbacks
                    .write()
                    .insert(fix.category.clone(), fix.payload.trim().to_string());
            }
            FixKind::FeatureDisable => {
                self.disabled.write().insert(fix.payload.trim().to_string());
            }
            FixKind::CommandExecution => {
                if let Err(e) = self.run_command(&fix.payload).await {
                    warn!(fix_id = %fix.id, error = %e, "Fix command failed");
                    return Err(e);
                }
            }
            FixKind::CodePatch => {
                self.staged.write().push(StagedPatch {
                    fix_id: fix.id.clone(),
                    category: fix.category.clone(),
                    body: fix.payload.clone(),
                });
            }
            FixKind::DriverUpdate | FixKind::Manual => {
                return Err(format!("{} fixes are carried out by an operator", fix.kind));
            }
        }
        info!(fix_id = %fix.id, kind = %fix.kind, category = %fix.category, "Fix executed");
        Ok(())
    }
}
