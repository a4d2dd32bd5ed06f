//! # Adapters Module
//!
//! Category appliers, one per installable update category.
//!
//! ## Modules
//!
//! - `binary`: stages a binary patch for the next restart
//! - `model`: hot-swaps model weights
//! - `config`: deep-merges JSON configuration
//! - `blocklist`: replaces the blocked host list
//! - `assets`: replaces the captive-portal asset bundle

pub mod assets;
pub mod binary;
pub mod blocklist;
pub mod config;
pub mod model;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ports::outbound::CategoryApplier;

pub use assets::AssetBundleApplier;
pub use binary::{BinaryStager, StagedBinary};
pub use blocklist::BlocklistApplier;
pub use config::ConfigMerger;
pub use model::{LoadedModel, ModelSlot};

/// Current value plus the one it replaced.
pub(crate) struct Snapshotted<T> {
    slots: RwLock<(Option<T>, Option<T>)>,
}

impl<T: Clone> Snapshotted<T> {
    pub(crate) fn new(initial: Option<T>) -> Self {
        Self {
            slots: RwLock::new((initial, None)),
        }
    }

    pub(crate) fn current(&self) -> Option<T> {
        self.slots.read().0.clone()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.slots.read().0.as_ref())
    }

    pub(crate) fn replace(&self, next: T) {
        let mut slots = self.slots.write();
        slots.1 = slots.0.replace(next);
    }

    /// Swaps the snapshot back in. False if there is none.
    pub(crate) fn rollback(&self) -> bool {
        let mut slots = self.slots.write();
        match slots.1.take() {
            Some(previous) => {
                slots.0 = Some(previous);
                true
            }
            None => false,
        }
    }
}

/// The appliers every node installs by default.
pub fn standard_appliers() -> Vec<Arc<dyn CategoryApplier>> {
    vec![
        Arc::new(BinaryStager::new()),
        Arc::new(ModelSlot::new()),
        Arc::new(ConfigMerger::default()),
        Arc::new(BlocklistApplier::new()),
        Arc::new(AssetBundleApplier::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rollback_restores_previous() {
        let slot = Snapshotted::new(Some(1));
        slot.replace(2);
        assert_eq!(slot.current(), Some(2));
        assert!(slot.rollback());
        assert_eq!(slot.current(), Some(1));
        assert!(!slot.rollback());
    }

    #[test]
    fn test_standard_appliers_cover_installable_categories() {
        let mut categories: Vec<_> = standard_appliers().iter().map(|a| a.category()).collect();
        categories.sort();
        assert_eq!(categories.len(), 5);
        assert!(!categories.iter().any(|c| c.is_fix()));
    }
}
