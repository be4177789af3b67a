// Unit of Work - resolves contexts, joins or starts transactions, commits and disposes them

mod record;
mod registry;


pub use record::{ActiveTransactionRecord, Attendee};
pub use registry::TransactionRegistry;

use crate::domain::{ConnectionConfiguration, ContextType, Entity, EntityType};
use crate::error::{ResolveStep, Result, StoreError, UnitOfWorkError};
use crate::port::{
    ContextConfigProvider, ContextResolver, EntityContextLocator, PersistenceContext,
    ResolveOptions, TimeProvider,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Coordinates the transactions of every context resolved during one logical operation.
///
/// Contexts whose configurations share a connection key are grouped under one
/// [`ActiveTransactionRecord`]. The first context on a key starts the physical
/// transaction; later ones either enlist in it (relational stores) or begin an
/// independent transaction that is committed separately.
///
/// A unit of work is meant for a single logical operation and is not
/// synchronized. Always call [`UnitOfWork::dispose`] when done (or use
/// [`crate::UnitOfWorkFactory::scope`]); `Drop` cannot release async resources.
///
/// # Example
/// ```text
/// let mut uow = factory.begin();
/// let sales = uow.context_as::<Order, SqliteContext>().await?;
/// sales.execute("INSERT INTO orders (id) VALUES (1)").await?;
/// uow.commit().await?;
/// uow.dispose().await?;
/// ```
pub struct UnitOfWork {
    locator: Arc<dyn EntityContextLocator>,
    config_provider: Arc<dyn ContextConfigProvider>,
    resolver: Arc<dyn ContextResolver>,
    time_provider: Arc<dyn TimeProvider>,
    registry: TransactionRegistry,
}

impl UnitOfWork {
    pub fn new(
        locator: Arc<dyn EntityContextLocator>,
        config_provider: Arc<dyn ContextConfigProvider>,
        resolver: Arc<dyn ContextResolver>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            locator,
            config_provider,
            resolver,
            time_provider,
            registry: TransactionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    pub fn active_transaction_count(&self) -> usize {
        self.registry.len()
    }

    /// Context owning entity `E`
    pub async fn context_for<E: Entity>(&mut self) -> Result<&mut dyn PersistenceContext> {
        self.resolve(&E::entity_type()).await
    }

    /// Context owning entity `E`, downcast to the adapter type `C`
    pub async fn context_as<E: Entity, C: PersistenceContext + 'static>(
        &mut self,
    ) -> Result<&mut C> {
        let context = self.resolve(&E::entity_type()).await?;
        let context_type = context.context_type().clone();
        context
            .as_any_mut()
            .downcast_mut::<C>()
            .ok_or(UnitOfWorkError::ContextTypeMismatch {
                context: context_type,
                expected: std::any::type_name::<C>(),
            })
    }

    /// Resolve a new context for `entity`, starting or joining the transaction of its connection.
    ///
    /// A failed resolve leaves every established transaction untouched.
    pub async fn resolve(&mut self, entity: &EntityType) -> Result<&mut dyn PersistenceContext> {
        let context_type = self.locator.owner_of(entity)?;
        let config = self.config_provider.config_for(&context_type)?;
        let key = config.connection_key();

        if self.registry.contains(&key) {
            self.join(context_type, config).await
        } else {
            self.start(context_type, config).await
        }
    }

    /// First context on a connection key: open a transaction and register a new record
    async fn start(
        &mut self,
        context_type: ContextType,
        config: ConnectionConfiguration,
    ) -> Result<&mut dyn PersistenceContext> {
        let key = config.connection_key();
        let options = ResolveOptions::new(context_type.clone(), config);

        let mut context = self
            .resolver
            .resolve(options)
            .await
            .map_err(|source| UnitOfWorkError::ResolveFailed {
                step: ResolveStep::Resolve,
                context: context_type.clone(),
                key: key.clone(),
                source,
            })?;

        let transaction = match context.begin_transaction().await {
            Ok(transaction) => transaction,
            Err(source) => {
                abandon(context).await;
                return Err(UnitOfWorkError::ResolveFailed {
                    step: ResolveStep::BeginTransaction,
                    context: context_type,
                    key,
                    source,
                });
            }
        };

        debug!(
            connection = %key,
            context = %context_type,
            transaction = %transaction.id(),
            "Started transaction"
        );

        let record = ActiveTransactionRecord::new(
            key,
            transaction,
            context,
            self.time_provider.now_millis(),
        );
        Ok(self.registry.insert(record)?.starter_mut())
    }

    /// Later context on an active connection key: attach to the record's connection,
    /// then enlist or begin an independent transaction depending on the new context
    async fn join(
        &mut self,
        context_type: ContextType,
        config: ConnectionConfiguration,
    ) -> Result<&mut dyn PersistenceContext> {
        let key = config.connection_key();
        let resolver = Arc::clone(&self.resolver);
        let Some(record) = self.registry.lookup_mut(&key) else {
            return Err(UnitOfWorkError::ResolveFailed {
                step: ResolveStep::Resolve,
                context: context_type,
                key: key.clone(),
                source: StoreError::InvalidState(format!("no active transaction for `{}`", key)),
            });
        };

        let options =
            ResolveOptions::new(context_type.clone(), config).attached_to(record.connection());
        let mut context = resolver
            .resolve(options)
            .await
            .map_err(|source| UnitOfWorkError::ResolveFailed {
                step: ResolveStep::Resolve,
                context: context_type.clone(),
                key: key.clone(),
                source,
            })?;

        // The capability of the joining context decides, not the starter's.
        let own_transaction = if context.supports_shared_relational_transaction() {
            if let Err(source) = context.use_transaction(record.transaction()) {
                abandon(context).await;
                return Err(UnitOfWorkError::ResolveFailed {
                    step: ResolveStep::EnlistTransaction,
                    context: context_type,
                    key,
                    source,
                });
            }
            None
        } else {
            match context.begin_transaction().await {
                Ok(transaction) => Some(transaction),
                Err(source) => {
                    abandon(context).await;
                    return Err(UnitOfWorkError::ResolveFailed {
                        step: ResolveStep::BeginTransaction,
                        context: context_type,
                        key,
                        source,
                    });
                }
            }
        };

        debug!(
            connection = %key,
            context = %context_type,
            shared = own_transaction.is_none(),
            attendees = record.attendees().len() + 1,
            "Joined active transaction"
        );

        Ok(record.attend(context, own_transaction).context_mut())
    }

    /// Commit every record in insertion order.
    ///
    /// The first failure is returned immediately. Records committed before it stay
    /// committed: there is no atomicity across connection keys.
    pub async fn commit(&mut self) -> Result<()> {
        for record in self.registry.iter_mut() {
            if let Err(err) = record.commit().await {
                error!(error = %err, "Commit failed");
                return Err(err);
            }

            info!(
                connection = %record.key(),
                contexts = record.context_count(),
                held_ms = self.time_provider.elapsed_millis(record.started_at()),
                "Committed transaction"
            );
        }

        Ok(())
    }

    /// Roll back every record, continuing past failures
    pub async fn rollback(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for record in self.registry.iter_mut() {
            record.rollback(&mut failures).await;
        }

        if failures.is_empty() {
            info!(records = self.registry.len(), "Rolled back unit of work");
            Ok(())
        } else {
            Err(UnitOfWorkError::RollbackFailed { failures })
        }
    }

    /// Release every transaction handle and context, then clear the registry.
    ///
    /// Runs to completion even when individual releases fail; the failures are
    /// reported together. A second call is a no-op.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }

        let mut failures = Vec::new();
        let mut contexts = 0;
        for record in self.registry.iter_mut() {
            contexts += record.context_count();
            record.release(&mut failures).await;
        }
        let records = self.registry.len();
        self.registry.clear();

        info!(
            records = records,
            contexts = contexts,
            failures = failures.len(),
            "Disposed unit of work"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(UnitOfWorkError::DisposeFailed { failures })
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                records = self.registry.len(),
                connections = ?self.registry.keys().collect::<Vec<_>>(),
                "Unit of work dropped without dispose; resources are released by drop only"
            );
        }
    }
}

/// Best-effort release of a context that never made it into the registry
async fn abandon(mut context: Box<dyn PersistenceContext>) {
    if let Err(err) = context.dispose().await {
        warn!(
            context = %context.context_type(),
            error = %err,
            "Failed to dispose abandoned context"
        );
    }
}
