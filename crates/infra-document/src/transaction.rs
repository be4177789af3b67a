// Document Store Transaction - staged writes applied as one batch on commit

use crate::store::{DocumentStore, DocumentWrite};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use unitwork_core::domain::{SharedConnection, TransactionId};
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::TransactionHandle;

/// Write buffer shared between a context and the transaction it began
#[derive(Debug, Default)]
pub(crate) struct Staging {
    pub(crate) writes: Vec<DocumentWrite>,
    pub(crate) open: bool,
}

pub(crate) type SharedStaging = Arc<Mutex<Staging>>;

pub(crate) fn lock(staging: &SharedStaging) -> MutexGuard<'_, Staging> {
    staging.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DocumentTransaction {
    id: TransactionId,
    store: Arc<DocumentStore>,
    staging: SharedStaging,
    disposed: bool,
}

impl DocumentTransaction {
    pub(crate) fn begin(store: Arc<DocumentStore>) -> (Self, SharedStaging) {
        let staging = Arc::new(Mutex::new(Staging {
            writes: Vec::new(),
            open: true,
        }));
        let transaction = Self {
            id: TransactionId::new(),
            store,
            staging: Arc::clone(&staging),
            disposed: false,
        };
        (transaction, staging)
    }

    pub fn is_open(&self) -> bool {
        lock(&self.staging).open
    }

    pub fn staged_writes(&self) -> usize {
        lock(&self.staging).writes.len()
    }
}

#[async_trait]
impl TransactionHandle for DocumentTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn connection(&self) -> SharedConnection {
        SharedConnection::new(self.store.connection_key(), Arc::clone(&self.store))
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut staging = lock(&self.staging);
        if !staging.open {
            return Err(StoreError::InvalidState(format!(
                "document transaction {} is not open",
                self.id
            )));
        }

        // Staged writes survive a failed batch so a rollback can still discard them
        self.store.apply(&staging.writes)?;
        let applied = staging.writes.len();
        staging.writes.clear();
        staging.open = false;

        debug!(store = %self.store.name(), transaction = %self.id, writes = applied, "Committed");
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let mut staging = lock(&self.staging);
        staging.writes.clear();
        staging.open = false;
        Ok(())
    }

    async fn dispose(&mut self) -> StoreResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    fn stage(staging: &SharedStaging, id: &str) {
        lock(staging).writes.push(DocumentWrite::Put {
            collection: "events".to_string(),
            id: id.to_string(),
            document: json!({ "id": id }),
        });
    }

    // The store needs no runtime, so a plain executor drives these futures.
    #[test]
    fn test_commit_applies_staged_writes() {
        let store = Arc::new(DocumentStore::new("logs"));
        let (mut tx, staging) = DocumentTransaction::begin(Arc::clone(&store));

        stage(&staging, "1");
        stage(&staging, "2");
        assert_eq!(tx.staged_writes(), 2);
        assert_eq!(store.count("events"), 0);

        block_on(tx.commit()).unwrap();

        assert_eq!(store.count("events"), 2);
        assert!(!tx.is_open());
        assert!(matches!(
            block_on(tx.commit()).unwrap_err(),
            StoreError::InvalidState(_)
        ));
    }

    #[test]
    fn test_failed_commit_keeps_transaction_open() {
        let store = Arc::new(DocumentStore::new("logs"));
        store.set_read_only(true);
        let (mut tx, staging) = DocumentTransaction::begin(Arc::clone(&store));
        stage(&staging, "1");

        assert!(block_on(tx.commit()).is_err());
        assert!(tx.is_open());
        assert_eq!(tx.staged_writes(), 1);

        block_on(tx.dispose()).unwrap();
        assert!(!tx.is_open());
        assert_eq!(tx.staged_writes(), 0);
        assert_eq!(store.count("events"), 0);
    }

    #[test]
    fn test_connection_is_the_store() {
        let store = Arc::new(DocumentStore::new("logs"));
        let (tx, _staging) = DocumentTransaction::begin(Arc::clone(&store));

        let connection = tx.connection();
        assert_eq!(connection.key().as_str(), "logs");
        assert!(Arc::ptr_eq(&connection.downcast::<DocumentStore>().unwrap(), &store));
    }
}
