// In-process Document Store

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use unitwork_core::domain::ConnectionKey;
use unitwork_core::error::{StoreError, StoreResult};

/// One staged change to a collection
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    Put {
        collection: String,
        id: String,
        document: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl DocumentWrite {
    pub fn collection(&self) -> &str {
        match self {
            DocumentWrite::Put { collection, .. } | DocumentWrite::Delete { collection, .. } => {
                collection
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DocumentWrite::Put { id, .. } | DocumentWrite::Delete { id, .. } => id,
        }
    }
}

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// Named set of JSON collections; a batch of writes is applied atomically
pub struct DocumentStore {
    name: String,
    collections: Mutex<Collections>,
    read_only: AtomicBool,
    commits: AtomicU64,
}

impl DocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Mutex::new(HashMap::new()),
            read_only: AtomicBool::new(false),
            commits: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.name.clone())
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock()
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.lock().get(collection).map_or(0, BTreeMap::len)
    }

    /// Number of batches applied so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Reject every following commit (maintenance, failover)
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Apply a batch under one lock
    pub fn apply(&self, writes: &[DocumentWrite]) -> StoreResult<()> {
        if self.read_only.load(Ordering::Acquire) {
            return Err(StoreError::Database(format!(
                "document store `{}` is read-only",
                self.name
            )));
        }

        let mut collections = self.lock();
        for write in writes {
            match write {
                DocumentWrite::Put {
                    collection,
                    id,
                    document,
                } => {
                    collections
                        .entry(collection.clone())
                        .or_default()
                        .insert(id.clone(), document.clone());
                }
                DocumentWrite::Delete { collection, id } => {
                    if let Some(documents) = collections.get_mut(collection) {
                        documents.remove(id);
                    }
                }
            }
        }
        self.commits.fetch_add(1, Ordering::AcqRel);

        debug!(store = %self.name, writes = writes.len(), "Applied document batch");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of named stores; the connection string of a context names its store
#[derive(Default)]
pub struct DocumentServer {
    stores: Mutex<HashMap<String, Arc<DocumentStore>>>,
}

impl DocumentServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store named `name`, created on first use
    pub fn open(&self, name: &str) -> Arc<DocumentStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            stores
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(DocumentStore::new(name))),
        )
    }

    pub fn store(&self, name: &str) -> Option<Arc<DocumentStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put(collection: &str, id: &str, document: Value) -> DocumentWrite {
        DocumentWrite::Put {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        }
    }

    #[test]
    fn test_apply_put_and_delete() {
        let store = DocumentStore::new("logs");

        store
            .apply(&[
                put("events", "1", json!({"level": "info"})),
                put("events", "2", json!({"level": "warn"})),
            ])
            .unwrap();
        store
            .apply(&[DocumentWrite::Delete {
                collection: "events".to_string(),
                id: "1".to_string(),
            }])
            .unwrap();

        assert_eq!(store.count("events"), 1);
        assert!(store.get("events", "1").is_none());
        assert_eq!(store.get("events", "2"), Some(json!({"level": "warn"})));
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn test_read_only_store_rejects_batch() {
        let store = DocumentStore::new("logs");
        store.set_read_only(true);

        let err = store.apply(&[put("events", "1", json!({}))]).unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.count("events"), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn test_server_returns_same_store_for_name() {
        let server = DocumentServer::new();

        let first = server.open("logs");
        let second = server.open("logs");
        let other = server.open("audit");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(server.store("missing").is_none());
        assert_eq!(first.connection_key(), ConnectionKey::new("logs"));
    }
}
