//! Durable identifier storage.
//!
//! Persists the root-record and share identifiers so a restarted process
//! reuses the sharing hierarchy it created before instead of creating a
//! second one.

use async_trait::async_trait;
use itemsync_types::RecordId;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex;

/// Keys persisted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentifierKey {
    /// Identifier of the root-sharing record.
    RootRecord,
    /// Identifier of the share bound to the root record.
    Share,
}

impl IdentifierKey {
    /// Storage key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKey::RootRecord => "rootRecord",
            IdentifierKey::Share => "share",
        }
    }
}

/// Identifier store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read or write the backing file.
    #[error("identifier store I/O error at {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file holds malformed data.
    #[error("identifier store data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key → identifier mapping.
///
/// Writes are last-write-wins; the engine only writes on first creation.
#[async_trait]
pub trait IdentifierStore: Send + Sync {
    /// Read the identifier stored under `key`.
    async fn get(&self, key: IdentifierKey) -> Result<Option<RecordId>, StoreError>;

    /// Store every entry in one write: either all of them land or none do.
    async fn set_all(&self, entries: &[(IdentifierKey, RecordId)]) -> Result<(), StoreError>;

    /// Store `id` under `key`, replacing any previous value.
    async fn set(&self, key: IdentifierKey, id: &RecordId) -> Result<(), StoreError> {
        self.set_all(&[(key, id.clone())]).await
    }
}

/// In-memory identifier store.
///
/// Clones share state: keeping a clone across engine instances simulates a
/// process restart with persisted identifiers.
#[derive(Debug, Default, Clone)]
pub struct MemoryIdentifierStore {
    entries: Arc<StdMutex<HashMap<IdentifierKey, RecordId>>>,
}

impl MemoryIdentifierStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<IdentifierKey, RecordId>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored identifiers.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
impl IdentifierStore for MemoryIdentifierStore {
    async fn get(&self, key: IdentifierKey) -> Result<Option<RecordId>, StoreError> {
        Ok(self.entries().get(&key).cloned())
    }

    async fn set_all(&self, entries: &[(IdentifierKey, RecordId)]) -> Result<(), StoreError> {
        self.entries().extend(entries.iter().cloned());
        Ok(())
    }
}

/// Identifier store backed by a JSON file.
///
/// The file holds an object keyed by [`IdentifierKey::as_str`]; a missing
/// file reads as empty. Every write replaces the file through a rename.
#[derive(Debug)]
pub struct FileIdentifierStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIdentifierStore {
    /// Open (lazily) the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, RecordId>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, RecordId>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl IdentifierStore for FileIdentifierStore {
    async fn get(&self, key: IdentifierKey) -> Result<Option<RecordId>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key.as_str()))
    }

    async fn set_all(&self, entries: &[(IdentifierKey, RecordId)]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut stored = self.read_all().await?;
        for (key, id) in entries {
            stored.insert(key.as_str().to_string(), id.clone());
        }
        self.write_all(&stored).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemsync_types::ZoneId;

    fn root_id() -> RecordId {
        RecordId::new("com.itemsync.root.__defaultOwner__", ZoneId::owned("ItemsZone"))
    }

    fn share_id() -> RecordId {
        RecordId::new("com.itemsync.root.__defaultOwner__.share", ZoneId::owned("ItemsZone"))
    }

    #[tokio::test]
    async fn memory_store_starts_empty() {
        let store = MemoryIdentifierStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(IdentifierKey::RootRecord).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_clone_shares_entries() {
        let store = MemoryIdentifierStore::new();
        let restarted = store.clone();

        store.set(IdentifierKey::RootRecord, &root_id()).await.unwrap();

        assert_eq!(
            restarted.get(IdentifierKey::RootRecord).await.unwrap(),
            Some(root_id())
        );
        assert_eq!(restarted.get(IdentifierKey::Share).await.unwrap(), None);
        assert_eq!(restarted.len(), 1);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentifierStore::new(dir.path().join("ids.json"));

        assert_eq!(store.get(IdentifierKey::Share).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ids.json");

        let store = FileIdentifierStore::new(&path);
        store.set(IdentifierKey::RootRecord, &root_id()).await.unwrap();
        drop(store);

        let reopened = FileIdentifierStore::new(&path);
        assert_eq!(
            reopened.get(IdentifierKey::RootRecord).await.unwrap(),
            Some(root_id())
        );
    }

    #[tokio::test]
    async fn file_store_writes_entries_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        let store = FileIdentifierStore::new(&path);

        store
            .set_all(&[
                (IdentifierKey::RootRecord, root_id()),
                (IdentifierKey::Share, share_id()),
            ])
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["rootRecord"]["recordName"], root_id().record_name);
        assert_eq!(raw["share"]["recordName"], share_id().record_name);
        assert_eq!(raw["share"]["zoneName"], "ItemsZone");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileIdentifierStore::new(&path);
        assert!(matches!(
            store.get(IdentifierKey::RootRecord).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn file_store_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        // A regular file where a directory is expected.
        let store = FileIdentifierStore::new(blocker.join("ids.json"));
        let result = store.set(IdentifierKey::Share, &share_id()).await;

        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
