use std::collections::BTreeSet;

use async_trait::async_trait;
use shared_types::{UpdateCategory, UpdateEnvelope};
use tracing::info;

use super::Snapshotted;
use crate::domain::sandbox::parse_blocklist;
use crate::events::ApplyError;
use crate::ports::outbound::CategoryApplier;

/// Holds the blocked host list. Each update replaces the whole list.
pub struct BlocklistApplier {
    hosts: Snapshotted<BTreeSet<String>>,
}

impl BlocklistApplier {
    pub fn new() -> Self {
        Self {
            hosts: Snapshotted::new(Some(BTreeSet::new())),
        }
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.read(|hosts| {
            hosts.is_some_and(|hosts| {
                hosts.contains(&host)
                    || hosts.iter().any(|entry| {
                        entry
                            .strip_prefix("*.")
                            .is_some_and(|suffix| host.ends_with(&format!(".{}", suffix)))
                    })
            })
        })
    }

    pub fn len(&self) -> usize {
        self.hosts.read(|hosts| hosts.map_or(0, |h| h.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlocklistApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CategoryApplier for BlocklistApplier {
    fn category(&self) -> UpdateCategory {
        UpdateCategory::BlockedList
    }

    fn can_snapshot(&self) -> bool {
        true
    }

    async fn apply(&self, envelope: &UpdateEnvelope, payload: &[u8]) -> Result<(), ApplyError> {
        let entries: BTreeSet<String> = parse_blocklist(payload)
            .map_err(ApplyError::Malformed)?
            .into_iter()
            .collect();
        let count = entries.len();
        self.hosts.replace(entries);
        info!(version = %envelope.version, entries = count, "[mm-02] Blocklist replaced");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        self.hosts
            .rollback()
            .then_some(())
            .ok_or(ApplyError::NothingToRollBack)
    }
}
