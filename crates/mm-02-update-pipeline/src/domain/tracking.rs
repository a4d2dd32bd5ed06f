//! Shared registries: per-envelope pipeline state and installed versions.

use std::collections::{HashMap, VecDeque};

use parking_lot::{Mutex, RwLock};
use shared_types::UpdateCategory;

use super::entities::{AppliedRecord, PipelineState, Stage};

struct TrackerInner {
    states: HashMap<String, PipelineState>,
    finished: VecDeque<String>,
}

/// Current stage of every envelope seen by the pipeline.
///
/// In-progress entries are never evicted. Finished entries are kept up to
/// `retention`, oldest dropped first.
pub struct StageTracker {
    inner: Mutex<TrackerInner>,
    retention: usize,
}

impl StageTracker {
    pub fn new(retention: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                states: HashMap::new(),
                finished: VecDeque::new(),
            }),
            retention: retention.max(1),
        }
    }

    /// Claims an envelope for processing.
    ///
    /// Fails with the existing state if the envelope is running or was
    /// applied. A previously rejected envelope may run again.
    pub fn begin(&self, envelope_id: &str) -> Result<(), PipelineState> {
        let mut inner = self.inner.lock();
        match inner.states.get(envelope_id) {
            Some(state @ (PipelineState::InProgress(_) | PipelineState::Applied)) => Err(*state),
            _ => {
                inner
                    .states
                    .insert(envelope_id.to_string(), PipelineState::InProgress(Stage::Received));
                Ok(())
            }
        }
    }

    pub fn advance(&self, envelope_id: &str, stage: Stage) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.states.get_mut(envelope_id) {
            *state = PipelineState::InProgress(stage);
        }
    }

    pub fn finish(&self, envelope_id: &str, state: PipelineState) {
        let mut inner = self.inner.lock();
        inner.states.insert(envelope_id.to_string(), state);
        inner.finished.push_back(envelope_id.to_string());
        while inner.finished.len() > self.retention {
            let Some(oldest) = inner.finished.pop_front() else {
                break;
            };
            // A re-run may have pushed the same id twice; keep it while live.
            if inner.states.get(&oldest).is_some_and(|s| s.is_terminal())
                && !inner.finished.contains(&oldest)
            {
                inner.states.remove(&oldest);
            }
        }
    }

    pub fn state(&self, envelope_id: &str) -> Option<PipelineState> {
        self.inner.lock().states.get(envelope_id).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.inner
            .lock()
            .states
            .values()
            .filter(|s| !s.is_terminal())
            .count()
    }
}

/// The installed version per category, with the one it replaced.
#[derive(Default)]
pub struct AppliedRegistry {
    records: RwLock<HashMap<UpdateCategory, (AppliedRecord, Option<AppliedRecord>)>>,
}

impl AppliedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, category: UpdateCategory) -> Option<AppliedRecord> {
        self.records.read().get(&category).map(|(current, _)| current.clone())
    }

    pub fn record(&self, category: UpdateCategory, record: AppliedRecord) -> Option<AppliedRecord> {
        let mut records = self.records.write();
        let previous = records.remove(&category).map(|(current, _)| current);
        records.insert(category, (record, previous.clone()));
        previous
    }

    /// Makes the replaced record current again. Returns the restored record.
    pub fn revert(&self, category: UpdateCategory) -> Option<AppliedRecord> {
        let mut records = self.records.write();
        let entry = records.get_mut(&category)?;
        let previous = entry.1.take()?;
        entry.0 = previous.clone();
        Some(previous)
    }
}
