//! Binary patches are never executed in place; they are staged and picked
//! up by the supervisor on the next restart.

use async_trait::async_trait;
use shared_crypto::content_digest;
use shared_types::{UpdateCategory, UpdateEnvelope};
use tracing::info;

use super::Snapshotted;
use crate::events::ApplyError;
use crate::ports::outbound::CategoryApplier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBinary {
    /// Content store key holding the patch bytes.
    pub envelope_id: String,
    pub version: String,
    pub digest: String,
    pub size_bytes: u64,
}

pub struct BinaryStager {
    staged: Snapshotted<StagedBinary>,
}

impl BinaryStager {
    pub fn new() -> Self {
        Self {
            staged: Snapshotted::new(None),
        }
    }

    /// The patch to install on next restart.
    pub fn pending_restart(&self) -> Option<StagedBinary> {
        self.staged.current()
    }
}

impl Default for BinaryStager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CategoryApplier for BinaryStager {
    fn category(&self) -> UpdateCategory {
        UpdateCategory::BinaryPatch
    }

    fn can_snapshot(&self) -> bool {
        true
    }

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError> {
        if payload.is_empty() {
            return Err(ApplyError::Malformed("empty binary".into()));
        }
        self.staged.replace(StagedBinary {
            envelope_id: envelope.id.clone(),
            version: envelope.version.clone(),
            digest: content_digest(payload),
            size_bytes: payload.len() as u64,
        });
        info!(envelope_id = %envelope.id, version = %envelope.version, "[mm-02] Binary staged for restart");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        self.staged
            .rollback()
            .then_some(())
            .ok_or(ApplyError::NothingToRollBack)
    }
}
