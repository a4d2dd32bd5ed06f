//! Model weights are swapped atomically; readers holding the old `Arc`
//! finish on the old weights.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{UpdateCategory, UpdateEnvelope};
use tracing::info;

use super::Snapshotted;
use crate::domain::sandbox::ModelFormat;
use crate::events::ApplyError;
use crate::ports::outbound::CategoryApplier;

#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub version: String,
    pub format: ModelFormat,
    pub weights: Arc<Vec<u8>>,
}

pub struct ModelSlot {
    active: Snapshotted<LoadedModel>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            active: Snapshotted::new(None),
        }
    }

    pub fn active(&self) -> Option<LoadedModel> {
        self.active.current()
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CategoryApplier for ModelSlot {
    fn category(&self) -> UpdateCategory {
        UpdateCategory::ModelWeights
    }

    fn can_snapshot(&self) -> bool {
        true
    }

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError> {
        let format = ModelFormat::detect(payload)
            .ok_or_else(|| ApplyError::Malformed("unknown model format".into()))?;
        self.active.replace(LoadedModel {
            version: envelope.version.clone(),
            format,
            weights: Arc::new(payload.to_vec()),
        });
        info!(version = %envelope.version, format = ?format, "[mm-02] Model weights swapped");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        self.active
            .rollback()
            .then_some(())
            .ok_or(ApplyError::NothingToRollBack)
    }
}
