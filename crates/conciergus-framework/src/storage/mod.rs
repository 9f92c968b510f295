//! Per-plugin key-value persistence.
//!
//! # Backends
//!
//! [`KvStore`] is the strategy interface for the host's persistence
//! capability. Two implementations ship with the framework:
//!
//! | Backend | Durability | Failure modes |
//! |---------|------------|---------------|
//! | [`FileKv`] | JSON document on disk | I/O, serialization |
//! | [`MemoryKv`] | process lifetime | none |
//!
//! [`probe`] exercises a backend once at startup; hosts use it to pick the
//! durable store when it works and [`MemoryKv`] otherwise.
//!
//! # Namespacing
//!
//! [`PluginStorage`] prefixes every key with `plugin:<id>:`, so two plugins
//! writing `count` never see each other's value even when they share one
//! backend.

mod file;
mod memory;

pub use file::FileKv;
pub use memory::MemoryKv;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{StorageError, StorageResult};

const PROBE_KEY: &str = "__conciergus_probe__";

/// String key-value persistence provided by the host.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Every key currently stored, across all namespaces.
    async fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Writes, reads back and removes a probe key.
pub async fn probe(store: &dyn KvStore) -> StorageResult<()> {
    store.set(PROBE_KEY, "1".to_string()).await?;
    let read = store.get(PROBE_KEY).await?;
    store.remove(PROBE_KEY).await?;
    match read.as_deref() {
        Some("1") => Ok(()),
        _ => Err(StorageError::Unavailable(format!(
            "{} store did not return the probe value",
            store.name()
        ))),
    }
}

/// Returns `store` if it passes [`probe`], or a fresh [`MemoryKv`].
pub async fn probe_or_memory(store: Arc<dyn KvStore>) -> Arc<dyn KvStore> {
    match probe(store.as_ref()).await {
        Ok(()) => store,
        Err(e) => {
            warn!(
                backend = store.name(),
                error = %e,
                "Durable plugin storage unavailable, falling back to memory"
            );
            Arc::new(MemoryKv::new())
        }
    }
}

// =============================================================================
// PluginStorage
// =============================================================================

/// Namespaced storage handed to a plugin through its
/// [`PluginContext`](crate::PluginContext).
///
/// Values are stored as JSON. Backend failures are logged and never
/// returned. A write or remove the backend rejects is kept in a private
/// pending map (a value, or a tombstone for removes) that shadows the
/// backend on reads. Pending entries are replayed after the next write the
/// backend accepts.
pub struct PluginStorage {
    plugin_id: String,
    prefix: String,
    backend: Arc<dyn KvStore>,
    /// Full key to the newest value not yet persisted; `None` is a tombstone.
    pending: Mutex<HashMap<String, Option<String>>>,
}

impl PluginStorage {
    pub fn new(plugin_id: impl Into<String>, backend: Arc<dyn KvStore>) -> Self {
        let plugin_id = plugin_id.into();
        Self {
            prefix: format!("plugin:{plugin_id}:"),
            plugin_id,
            backend,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Prefix applied to every key, `plugin:<id>:`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Reads and deserializes `key`.
    ///
    /// Returns `None` when the key is absent or holds a value that does not
    /// deserialize into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(plugin = %self.plugin_id, key, error = %e, "Stored value has unexpected shape");
                None
            }
        }
    }

    /// Serializes and stores `value` under `key`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(plugin = %self.plugin_id, key, error = %e, "Value not serializable, not stored");
                return;
            }
        };
        self.write(self.key(key), Some(raw)).await;
    }

    pub async fn remove(&self, key: &str) {
        self.write(self.key(key), None).await;
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get_raw(key).await.is_some()
    }

    /// This plugin's keys, without the namespace prefix, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys = BTreeSet::new();
        match self.backend.keys().await {
            Ok(all) => keys.extend(all),
            Err(e) => self.report(&e, "keys"),
        }
        for (key, value) in self.pending.lock().iter() {
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        keys.into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    /// Removes every key in this plugin's namespace.
    pub async fn clear(&self) {
        for key in self.keys().await {
            self.remove(&key).await;
        }
    }

    /// Number of writes still waiting for the backend.
    pub fn pending_writes(&self) -> usize {
        self.pending.lock().len()
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let full = self.key(key);
        let pending = self.pending.lock().get(&full).cloned();
        if let Some(pending) = pending {
            return pending;
        }
        match self.backend.get(&full).await {
            Ok(raw) => raw,
            Err(e) => {
                self.report(&e, "get");
                None
            }
        }
    }

    async fn write(&self, full: String, value: Option<String>) {
        let op = if value.is_some() { "set" } else { "remove" };
        // This write supersedes whatever was queued for the key.
        self.pending.lock().remove(&full);
        match self.apply(&full, value.clone()).await {
            Ok(()) => self.replay().await,
            Err(e) => {
                self.report(&e, op);
                self.pending.lock().insert(full, value);
            }
        }
    }

    async fn apply(&self, full: &str, value: Option<String>) -> StorageResult<()> {
        match value {
            Some(raw) => self.backend.set(full, raw).await,
            None => self.backend.remove(full).await,
        }
    }

    /// Drops the replayed entry for `full` unless a newer write replaced it
    /// while the backend call was in flight.
    fn settle(&self, full: &str, persisted: &Option<String>) {
        let mut pending = self.pending.lock();
        if pending.get(full).is_some_and(|v| v == persisted) {
            pending.remove(full);
        }
    }

    /// Pushes pending entries to the backend, stopping at the first failure.
    async fn replay(&self) {
        let queued: Vec<_> = self
            .pending
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (full, value) in queued {
            if let Err(e) = self.apply(&full, value.clone()).await {
                self.report(&e, "replay");
                return;
            }
            self.settle(&full, &value);
        }
    }

    fn report(&self, error: &StorageError, op: &str) {
        warn!(
            plugin  = %self.plugin_id,
            backend = self.backend.name(),
            op,
            error   = %error,
            "Plugin storage backend failed, keeping change in memory"
        );
    }
}

impl std::fmt::Debug for PluginStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginStorage")
            .field("prefix", &self.prefix)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}
