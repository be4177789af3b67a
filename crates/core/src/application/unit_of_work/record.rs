// Active Transaction Record - one physical transaction and every context running under it

use crate::domain::{ConnectionKey, ContextType, SharedConnection};
use crate::error::{ReleaseFailure, ResourceKind, Result, StoreError, UnitOfWorkError};
use crate::port::{PersistenceContext, TransactionHandle};
use tracing::{debug, warn};

/// Context that joined a record after its starter.
///
/// Relational attendees run inside the record's transaction; the others keep
/// the independent transaction they began when joining.
pub struct Attendee {
    context: Box<dyn PersistenceContext>,
    own_transaction: Option<Box<dyn TransactionHandle>>,
}

impl Attendee {
    pub fn context(&self) -> &dyn PersistenceContext {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> &mut dyn PersistenceContext {
        self.context.as_mut()
    }

    pub fn shares_transaction(&self) -> bool {
        self.own_transaction.is_none()
    }

    pub fn own_transaction(&self) -> Option<&dyn TransactionHandle> {
        self.own_transaction.as_deref()
    }
}

/// Groups the starter's transaction, the starter and its attendees for one connection key
pub struct ActiveTransactionRecord {
    key: ConnectionKey,
    transaction: Box<dyn TransactionHandle>,
    starter: Box<dyn PersistenceContext>,
    attendees: Vec<Attendee>,
    started_at: i64,
}

impl ActiveTransactionRecord {
    pub fn new(
        key: ConnectionKey,
        transaction: Box<dyn TransactionHandle>,
        starter: Box<dyn PersistenceContext>,
        started_at: i64,
    ) -> Self {
        Self {
            key,
            transaction,
            starter,
            attendees: Vec::new(),
            started_at,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn transaction(&self) -> &dyn TransactionHandle {
        self.transaction.as_ref()
    }

    /// Physical connection of the record's transaction
    pub fn connection(&self) -> SharedConnection {
        self.transaction.connection()
    }

    pub fn starter(&self) -> &dyn PersistenceContext {
        self.starter.as_ref()
    }

    pub fn starter_mut(&mut self) -> &mut dyn PersistenceContext {
        self.starter.as_mut()
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    pub fn attendees_mut(&mut self) -> &mut [Attendee] {
        &mut self.attendees
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// Number of context instances owned by this record
    pub fn context_count(&self) -> usize {
        1 + self.attendees.len()
    }

    pub(crate) fn attend(
        &mut self,
        context: Box<dyn PersistenceContext>,
        own_transaction: Option<Box<dyn TransactionHandle>>,
    ) -> &mut Attendee {
        self.attendees.push(Attendee {
            context,
            own_transaction,
        });
        let index = self.attendees.len() - 1;
        &mut self.attendees[index]
    }

    /// Commit the shared transaction, then each independent attendee transaction.
    /// Stops at the first failure.
    pub(crate) async fn commit(&mut self) -> Result<()> {
        if let Err(source) = self.transaction.commit().await {
            return Err(UnitOfWorkError::CommitFailed {
                key: self.key.clone(),
                context: self.starter.context_type().clone(),
                source,
            });
        }

        for attendee in &mut self.attendees {
            let Some(transaction) = attendee.own_transaction.as_mut() else {
                // shares the record's transaction
                continue;
            };
            if let Err(source) = transaction.commit().await {
                return Err(UnitOfWorkError::CommitFailed {
                    key: self.key.clone(),
                    context: attendee.context.context_type().clone(),
                    source,
                });
            }
        }

        Ok(())
    }

    /// Roll back every transaction of the record, collecting failures
    pub(crate) async fn rollback(&mut self, failures: &mut Vec<ReleaseFailure>) {
        if let Err(error) = self.transaction.rollback().await {
            failures.push(self.failure(
                self.starter.context_type().clone(),
                ResourceKind::Transaction,
                error,
            ));
        }

        for index in 0..self.attendees.len() {
            let attendee = &mut self.attendees[index];
            let Some(transaction) = attendee.own_transaction.as_mut() else {
                continue;
            };
            if let Err(error) = transaction.rollback().await {
                let context = attendee.context.context_type().clone();
                failures.push(self.failure(context, ResourceKind::IndependentTransaction, error));
            }
        }
    }

    /// Release the transaction, every attendee and finally the starter.
    /// Never stops early; each failure is collected.
    pub(crate) async fn release(&mut self, failures: &mut Vec<ReleaseFailure>) {
        let starter_type = self.starter.context_type().clone();

        if let Err(error) = self.transaction.dispose().await {
            failures.push(self.failure(starter_type.clone(), ResourceKind::Transaction, error));
        }

        for index in 0..self.attendees.len() {
            let attendee = &mut self.attendees[index];
            let context = attendee.context.context_type().clone();

            let transaction_result = match attendee.own_transaction.as_mut() {
                Some(transaction) => transaction.dispose().await,
                None => Ok(()),
            };
            let context_result = attendee.context.dispose().await;

            if let Err(error) = transaction_result {
                failures.push(self.failure(
                    context.clone(),
                    ResourceKind::IndependentTransaction,
                    error,
                ));
            }
            if let Err(error) = context_result {
                failures.push(self.failure(context, ResourceKind::Context, error));
            }
        }

        if let Err(error) = self.starter.dispose().await {
            failures.push(self.failure(starter_type, ResourceKind::Context, error));
        }

        debug!(
            connection = %self.key,
            contexts = self.context_count(),
            "Released transaction record"
        );
    }

    fn failure(
        &self,
        context: ContextType,
        resource: ResourceKind,
        error: StoreError,
    ) -> ReleaseFailure {
        warn!(
            connection = %self.key,
            context = %context,
            resource = %resource,
            error = %error,
            "Failed to release resource"
        );
        ReleaseFailure {
            key: self.key.clone(),
            context,
            resource,
            error,
        }
    }
}
