//! Node configuration held as a JSON document.
//!
//! Updates are merge patches: objects merge key by key, `null` deletes a
//! key, anything else replaces the value.

use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{UpdateCategory, UpdateEnvelope};
use tracing::info;

use super::Snapshotted;
use crate::events::ApplyError;
use crate::ports::outbound::CategoryApplier;

pub struct ConfigMerger {
    document: Snapshotted<Value>,
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl ConfigMerger {
    pub fn new(initial: Value) -> Self {
        Self {
            document: Snapshotted::new(Some(initial)),
        }
    }

    pub fn current(&self) -> Value {
        self.document.current().unwrap_or(Value::Null)
    }

    /// Looks up a value by JSON pointer, e.g. `/wifi/ssid`.
    pub fn get(&self, pointer: &str) -> Option<Value> {
        self.document
            .read(|doc| doc.and_then(|d| d.pointer(pointer)).cloned())
    }

    /// Merges `patch` into the document, keeping the old document as the
    /// rollback snapshot.
    pub fn merge_patch(&self, patch: &Value) -> Result<(), ApplyError> {
        if !patch.is_object() {
            return Err(ApplyError::Malformed("configuration patch must be an object".into()));
        }
        let mut next = self.current();
        if !next.is_object() {
            next = Value::Object(Map::new());
        }
        merge(&mut next, patch);
        self.document.replace(next);
        Ok(())
    }

    pub fn restore_previous(&self) -> Result<(), ApplyError> {
        self.document
            .rollback()
            .then_some(())
            .ok_or(ApplyError::NothingToRollBack)
    }
}

#[async_trait]
impl CategoryApplier for ConfigMerger {
    fn category(&self) -> UpdateCategory {
        UpdateCategory::Configuration
    }

    fn can_snapshot(&self) -> bool {
        true
    }

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError> {
        let patch: Value = serde_json::from_slice(payload)
            .map_err(|e| ApplyError::Malformed(format!("configuration is not JSON: {}", e)))?;
        self.merge_patch(&patch)?;
        info!(version = %envelope.version, "[mm-02] Configuration merged");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        self.restore_previous()
    }
}
