//! Local durable store.
//!
//! A synchronous key/value store organised in named collections. Records are
//! JSON values; the typed helpers at the bottom convert domain types and turn
//! undecodable records into [`Error::StoreCorruption`].
//!
//! Writes go through [`DurableStore::apply`], which lands a whole
//! [`WriteBatch`] or nothing. A failed write leaves both the persisted and
//! the in-memory state untouched.

use crate::{error::Result, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Logical collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Walks,
    Observations,
    PendingSync,
    DeadLetters,
    /// Provisional id → permanent id of every reconciled entity
    IdAliases,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Walks,
        Collection::Observations,
        Collection::PendingSync,
        Collection::DeadLetters,
        Collection::IdAliases,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Walks => "walks",
            Collection::Observations => "observations",
            Collection::PendingSync => "pendingSync",
            Collection::DeadLetters => "deadLetters",
            Collection::IdAliases => "idAliases",
        }
    }
}

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        collection: Collection,
        key: String,
        value: Value,
    },
    Remove {
        collection: Collection,
        key: String,
    },
}

/// An ordered set of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: Collection, key: impl Into<String>, value: Value) -> &mut Self {
        self.ops.push(WriteOp::Put {
            collection,
            key: key.into(),
            value,
        });
        self
    }

    /// Serialize `record` and add it as a put.
    pub fn put_record<T: Serialize>(
        &mut self,
        collection: Collection,
        key: impl Into<String>,
        record: &T,
    ) -> Result<&mut Self> {
        let value = serde_json::to_value(record)?;
        Ok(self.put(collection, key, value))
    }

    pub fn remove(&mut self, collection: Collection, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Remove {
            collection,
            key: key.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Storage contract used by the sync engine.
pub trait DurableStore: Send {
    /// Read a record by key.
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>>;

    /// All records in a collection matching `predicate`, in key order.
    fn list(&self, collection: Collection, predicate: &dyn Fn(&Value) -> bool) -> Result<Vec<Value>>;

    /// Apply every write in `batch`, or none of them.
    fn apply(&mut self, batch: WriteBatch) -> Result<()>;

    fn put(&mut self, collection: Collection, key: &str, value: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(collection, key, value);
        self.apply(batch)
    }

    fn remove(&mut self, collection: Collection, key: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.remove(collection, key);
        self.apply(batch)
    }

    /// Number of records in a collection.
    fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.list(collection, &|_| true)?.len())
    }
}

/// Records of every collection, ordered by collection and key.
pub type Tables = BTreeMap<Collection, BTreeMap<String, Value>>;

/// Apply a batch to a set of tables in place.
pub(crate) fn apply_to_tables(tables: &mut Tables, batch: WriteBatch) {
    for op in batch.ops {
        match op {
            WriteOp::Put {
                collection,
                key,
                value,
            } => {
                tables.entry(collection).or_default().insert(key, value);
            }
            WriteOp::Remove { collection, key } => {
                if let Some(table) = tables.get_mut(&collection) {
                    table.remove(&key);
                }
            }
        }
    }
}

pub(crate) fn list_tables(
    tables: &Tables,
    collection: Collection,
    predicate: &dyn Fn(&Value) -> bool,
) -> Vec<Value> {
    tables
        .get(&collection)
        .map(|table| table.values().filter(|v| predicate(v)).cloned().collect())
        .unwrap_or_default()
}

/// In-process store with no persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .get(&collection)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn list(&self, collection: Collection, predicate: &dyn Fn(&Value) -> bool) -> Result<Vec<Value>> {
        Ok(list_tables(&self.tables, collection, predicate))
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        apply_to_tables(&mut self.tables, batch);
        Ok(())
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.tables.get(&collection).map_or(0, BTreeMap::len))
    }
}

// ============================================================================
// Typed access
// ============================================================================

/// Read and decode one record.
pub fn get_record<T, S>(store: &S, collection: Collection, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: DurableStore + ?Sized,
{
    store
        .get(collection, key)?
        .map(|value| decode(collection, value))
        .transpose()
}

/// Read and decode every record of a collection.
pub fn list_records<T, S>(store: &S, collection: Collection) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: DurableStore + ?Sized,
{
    store
        .list(collection, &|_| true)?
        .into_iter()
        .map(|value| decode(collection, value))
        .collect()
}

fn decode<T: DeserializeOwned>(collection: Collection, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        Error::StoreCorruption(format!(
            "undecodable record in {}: {e}",
            collection.as_str()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_remove() {
        let mut store = MemoryStore::new();
        store
            .put(Collection::Walks, "p:tmp_1", json!({"name": "Loop"}))
            .unwrap();

        assert_eq!(
            store.get(Collection::Walks, "p:tmp_1").unwrap(),
            Some(json!({"name": "Loop"}))
        );
        assert_eq!(store.get(Collection::Observations, "p:tmp_1").unwrap(), None);

        store.remove(Collection::Walks, "p:tmp_1").unwrap();
        assert_eq!(store.get(Collection::Walks, "p:tmp_1").unwrap(), None);
    }

    #[test]
    fn list_filters_and_orders_by_key() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Walks, "b", json!({"n": 2}))
            .put(Collection::Walks, "a", json!({"n": 1}))
            .put(Collection::Walks, "c", json!({"n": 3}));
        store.apply(batch).unwrap();

        let odd = store
            .list(Collection::Walks, &|v| v["n"].as_u64().unwrap_or(0) % 2 == 1)
            .unwrap();
        assert_eq!(odd, vec![json!({"n": 1}), json!({"n": 3})]);
        assert_eq!(store.count(Collection::Walks).unwrap(), 3);
    }

    #[test]
    fn batch_applies_in_order() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Walks, "a", json!(1))
            .remove(Collection::Walks, "a")
            .put(Collection::Walks, "b", json!(2));
        assert_eq!(batch.len(), 3);
        store.apply(batch).unwrap();

        assert_eq!(store.get(Collection::Walks, "a").unwrap(), None);
        assert_eq!(store.get(Collection::Walks, "b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn undecodable_records_are_corruption() {
        let mut store = MemoryStore::new();
        store
            .put(Collection::PendingSync, "1", json!({"garbage": true}))
            .unwrap();

        let result: Result<Vec<crate::PendingSyncItem>> =
            list_records(&store, Collection::PendingSync);
        assert!(matches!(result, Err(Error::StoreCorruption(_))));
    }
}
