// Document Store Persistence Context

use crate::store::{DocumentStore, DocumentWrite};
use crate::transaction::{lock, DocumentTransaction, SharedStaging};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;
use unitwork_core::domain::{ContextType, TransactionId};
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::{PersistenceContext, TransactionHandle};

/// Context over one [`DocumentStore`].
///
/// Writes are staged in the context's own transaction and become visible to
/// other contexts only on commit. Reads see the context's staged writes first.
pub struct DocumentContext {
    context_type: ContextType,
    store: Arc<DocumentStore>,
    transaction: Option<(TransactionId, SharedStaging)>,
    disposed: bool,
}

impl DocumentContext {
    pub(crate) fn new(context_type: ContextType, store: Arc<DocumentStore>) -> Self {
        Self {
            context_type,
            store,
            transaction: None,
            disposed: false,
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn put<T: Serialize>(&self, collection: &str, id: &str, document: &T) -> StoreResult<()> {
        let document = serde_json::to_value(document)
            .map_err(|e| StoreError::Database(format!("Failed to serialize document: {}", e)))?;
        self.stage(DocumentWrite::Put {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        })
    }

    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.stage(DocumentWrite::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Latest version of a document, including writes staged by this context
    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        let staged = self.transaction.as_ref().and_then(|(_, staging)| {
            lock(staging)
                .writes
                .iter()
                .rev()
                .find(|w| w.collection() == collection && w.id() == id)
                .cloned()
        });

        let value = match staged {
            Some(DocumentWrite::Put { document, .. }) => Some(document),
            Some(DocumentWrite::Delete { .. }) => None,
            None => self.store.get(collection, id),
        };

        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Database(format!("Failed to deserialize document: {}", e)))
    }

    fn stage(&self, write: DocumentWrite) -> StoreResult<()> {
        self.ensure_open()?;
        let Some((id, staging)) = &self.transaction else {
            return Err(StoreError::InvalidState(format!(
                "context `{}` has no transaction",
                self.context_type
            )));
        };

        let mut staging = lock(staging);
        if !staging.open {
            return Err(StoreError::InvalidState(format!(
                "transaction {} of `{}` is already finished",
                id, self.context_type
            )));
        }
        staging.writes.push(write);
        Ok(())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.disposed {
            return Err(StoreError::InvalidState(format!(
                "context `{}` is disposed",
                self.context_type
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceContext for DocumentContext {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    fn supports_shared_relational_transaction(&self) -> bool {
        false
    }

    fn current_transaction(&self) -> Option<TransactionId> {
        self.transaction.as_ref().map(|(id, _)| *id)
    }

    async fn begin_transaction(&mut self) -> StoreResult<Box<dyn TransactionHandle>> {
        self.ensure_open()?;
        if let Some((id, staging)) = &self.transaction {
            if lock(staging).open {
                return Err(StoreError::InvalidState(format!(
                    "transaction {} of `{}` is still open",
                    id, self.context_type
                )));
            }
        }

        let (transaction, staging) = DocumentTransaction::begin(Arc::clone(&self.store));
        self.transaction = Some((transaction.id(), staging));
        Ok(Box::new(transaction))
    }

    fn use_transaction(&mut self, transaction: &dyn TransactionHandle) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!(
            "document context `{}` cannot enlist in transaction {}",
            self.context_type,
            transaction.id()
        )))
    }

    async fn dispose(&mut self) -> StoreResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.transaction = None;
        debug!(
            context = %self.context_type,
            store = %self.store.name(),
            "Disposed document context"
        );
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
