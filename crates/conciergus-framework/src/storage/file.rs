//! Durable key-value store persisted as a single JSON document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::KvStore;
use crate::error::StorageResult;

/// [`KvStore`] that keeps every entry in memory and rewrites a JSON file on
/// each mutation.
///
/// Writes go to `<path>.tmp` first and are renamed into place, so a crash
/// mid-write leaves the previous document intact. A failed write leaves the
/// in-memory view unchanged.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKv {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is treated as an empty store; a file that is not a
    /// JSON object of strings is an error.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<F>(&self, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKv {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.mutate(|map| {
            map.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.mutate(|map| map.remove(key).is_some()).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileKv::open(&path).await.unwrap();
        store.set("a", "1".into()).await.unwrap();
        store.set("b", "2".into()).await.unwrap();
        store.remove("a").await.unwrap();
        drop(store);

        let reopened = FileKv::open(&path).await.unwrap();
        assert_eq!(reopened.get("a").await.unwrap(), None);
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
        assert_eq!(reopened.keys().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"[1, 2]").await.unwrap();

        assert!(FileKv::open(&path).await.is_err());
    }
}
