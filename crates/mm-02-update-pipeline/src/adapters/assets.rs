//! Captive-portal asset bundle. An update replaces the bundle wholesale.

use std::collections::BTreeMap;

use async_trait::async_trait;
use shared_types::{UpdateCategory, UpdateEnvelope};
use tracing::info;

use super::Snapshotted;
use crate::domain::sandbox::parse_asset_manifest;
use crate::events::ApplyError;
use crate::ports::outbound::CategoryApplier;

pub struct AssetBundleApplier {
    bundle: Snapshotted<BTreeMap<String, String>>,
}

impl AssetBundleApplier {
    pub fn new() -> Self {
        Self {
            bundle: Snapshotted::new(Some(BTreeMap::new())),
        }
    }

    pub fn asset(&self, path: &str) -> Option<String> {
        self.bundle.read(|b| b.and_then(|b| b.get(path).cloned()))
    }

    pub fn paths(&self) -> Vec<String> {
        self.bundle
            .read(|b| b.map(|b| b.keys().cloned().collect()).unwrap_or_default())
    }
}

impl Default for AssetBundleApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CategoryApplier for AssetBundleApplier {
    fn category(&self) -> UpdateCategory {
        UpdateCategory::PortalAssets
    }

    fn can_snapshot(&self) -> bool {
        true
    }

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError> {
        let bundle = parse_asset_manifest(payload).map_err(ApplyError::Malformed)?;
        let count = bundle.len();
        self.bundle.replace(bundle);
        info!(version = %envelope.version, assets = count, "[mm-02] Portal assets replaced");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        self.bundle
            .rollback()
            .then_some(())
            .ok_or(ApplyError::NothingToRollBack)
    }
}
