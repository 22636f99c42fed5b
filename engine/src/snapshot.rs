//! File-backed durable store.
//!
//! The whole store is one JSON snapshot on disk. Every batch is applied to a
//! copy of the current tables, written to a temporary sibling file, and
//! renamed over the snapshot; only then does the in-memory copy advance.
//! BTreeMaps keep the serialized form deterministic.

use crate::{
    error::Result,
    store::{apply_to_tables, list_tables, Collection, DurableStore, Tables, WriteBatch},
    Error,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// On-disk representation of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub format_version: u32,
    pub collections: Tables,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections: Tables::new(),
        }
    }
}

impl StoreSnapshot {
    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::StoreCorruption(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| Error::StoreCorruption(format!("unreadable snapshot: {e}")))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::StoreCorruption(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }

    pub fn record_count(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, |c| c.len())
    }
}

/// Store persisted as a single JSON snapshot file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    snapshot: StoreSnapshot,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match fs::read_to_string(&path) {
            Ok(json) => StoreSnapshot::from_json(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreSnapshot::default(),
            Err(e) => {
                return Err(Error::StoreCorruption(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        tracing::debug!(
            path = %path.display(),
            walks = snapshot.record_count(Collection::Walks),
            pending = snapshot.record_count(Collection::PendingSync),
            "Opened file store"
        );

        Ok(Self { path, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let json = snapshot.to_json_pretty()?;
        let tmp = self.path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::StoreCorruption(format!("cannot write {}: {e}", self.path.display()))
        })
    }
}

impl DurableStore for FileStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        Ok(self
            .snapshot
            .collections
            .get(&collection)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn list(&self, collection: Collection, predicate: &dyn Fn(&Value) -> bool) -> Result<Vec<Value>> {
        Ok(list_tables(&self.snapshot.collections, collection, predicate))
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut next = self.snapshot.clone();
        apply_to_tables(&mut next.collections, batch);
        self.persist(&next)?;
        self.snapshot = next;
        Ok(())
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.snapshot.record_count(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        assert_eq!(store.count(Collection::Walks).unwrap(), 0);
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let mut store = FileStore::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch
                .put(Collection::Walks, "p:tmp_1", json!({"name": "Forest loop"}))
                .put(Collection::PendingSync, "1", json!({"seq": 1}));
            store.apply(batch).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.get(Collection::Walks, "p:tmp_1").unwrap(),
            Some(json!({"name": "Forest loop"}))
        );
        assert_eq!(store.count(Collection::PendingSync).unwrap(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn failed_write_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        let mut store = FileStore::open(&path).unwrap();

        let result = store.put(Collection::Walks, "a", json!(1));
        assert!(matches!(result, Err(Error::StoreCorruption(_))));
        assert_eq!(store.get(Collection::Walks, "a").unwrap(), None);
    }

    #[test]
    fn garbage_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(Error::StoreCorruption(_))
        ));
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{"formatVersion": 999, "collections": {}}"#;
        assert!(matches!(
            StoreSnapshot::from_json(json),
            Err(Error::StoreCorruption(_))
        ));
    }

    #[test]
    fn deterministic_serialization() {
        let mut a = StoreSnapshot::default();
        let mut b = StoreSnapshot::default();

        let mut forward = WriteBatch::new();
        forward
            .put(Collection::Walks, "a", json!(1))
            .put(Collection::Walks, "b", json!(2));
        let mut reverse = WriteBatch::new();
        reverse
            .put(Collection::Walks, "b", json!(2))
            .put(Collection::Walks, "a", json!(1));

        apply_to_tables(&mut a.collections, forward);
        apply_to_tables(&mut b.collections, reverse);

        assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
    }
}
