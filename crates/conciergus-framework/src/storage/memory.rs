//! In-process key-value store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::KvStore;
use crate::error::StorageResult;

/// Volatile [`KvStore`] backed by a map. Never fails.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
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
impl KvStore for MemoryKv {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
