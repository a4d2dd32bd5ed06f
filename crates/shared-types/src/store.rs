//! # Content Store
//!
//! Key/value storage for payload bytes. Dissemination parks broadcast
//! payloads here so peers can fetch them; the pipeline and self-healing
//! cache fetched payloads here.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::StoreError;

/// Content storage port.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Returns `StoreError::NotFound` when the key is absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn contains(&self, key: &str) -> bool;
}

/// Map-backed store for tests and single-process meshes.
#[derive(Default)]
pub struct InMemoryContentStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        self.entries.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}
