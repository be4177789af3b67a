// Persistence Context & Transaction Ports

use crate::domain::{ContextType, SharedConnection, TransactionId};
use crate::error::StoreResult;
use async_trait::async_trait;
use std::any::Any;

/// One physical transaction plus the connection it runs on
#[async_trait]
pub trait TransactionHandle: Send {
    fn id(&self) -> TransactionId;

    /// Connection the transaction runs on (handed to joining contexts)
    fn connection(&self) -> SharedConnection;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;

    /// Release the handle, rolling back first if it is still open
    async fn dispose(&mut self) -> StoreResult<()>;
}

/// Unit-of-work scope bound to one data model and one connection
#[async_trait]
pub trait PersistenceContext: Send {
    fn context_type(&self) -> &ContextType;

    /// Whether this context can run inside another context's physical transaction
    fn supports_shared_relational_transaction(&self) -> bool;

    /// Transaction the context currently runs in (own or enlisted)
    fn current_transaction(&self) -> Option<TransactionId>;

    /// Begin a transaction owned by this context
    async fn begin_transaction(&mut self) -> StoreResult<Box<dyn TransactionHandle>>;

    /// Enlist in a transaction owned by another context on the same connection
    fn use_transaction(&mut self, transaction: &dyn TransactionHandle) -> StoreResult<()>;

    async fn dispose(&mut self) -> StoreResult<()>;

    /// Downcast hook for typed access to the adapter context
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ConnectionKey;
    use crate::error::StoreError;
    use crate::port::{ContextResolver, ResolveOptions};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Operation a [`StoreJournal`] can be told to fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum FailPoint {
        Resolve,
        Begin,
        Enlist,
        Commit,
        Rollback,
        DisposeTransaction,
        DisposeContext,
    }

    /// Everything the recording fakes did, in order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StoreEvent {
        Resolved {
            instance: usize,
            context: ContextType,
            attached: bool,
        },
        Began {
            instance: usize,
            transaction: TransactionId,
        },
        Enlisted {
            instance: usize,
            transaction: TransactionId,
        },
        Committed {
            transaction: TransactionId,
        },
        RolledBack {
            transaction: TransactionId,
        },
        TransactionDisposed {
            transaction: TransactionId,
        },
        ContextDisposed {
            instance: usize,
        },
    }

    #[derive(Default)]
    struct JournalState {
        events: Vec<StoreEvent>,
        fail_points: HashSet<(FailPoint, ContextType)>,
        next_instance: usize,
    }

    /// Shared log of store calls with injectable failures
    #[derive(Clone, Default)]
    pub struct StoreJournal {
        state: Arc<Mutex<JournalState>>,
    }

    impl StoreJournal {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `point` fail for every context (or transaction) of `context`
        pub fn fail_on(&self, point: FailPoint, context: &ContextType) {
            self.state
                .lock()
                .unwrap()
                .fail_points
                .insert((point, context.clone()));
        }

        pub fn events(&self) -> Vec<StoreEvent> {
            self.state.lock().unwrap().events.clone()
        }

        pub fn count(&self, predicate: impl Fn(&StoreEvent) -> bool) -> usize {
            self.state
                .lock()
                .unwrap()
                .events
                .iter()
                .filter(|e| predicate(e))
                .count()
        }

        pub fn commits(&self) -> usize {
            self.count(|e| matches!(e, StoreEvent::Committed { .. }))
        }

        pub fn rollbacks(&self) -> usize {
            self.count(|e| matches!(e, StoreEvent::RolledBack { .. }))
        }

        pub fn disposed_transactions(&self) -> usize {
            self.count(|e| matches!(e, StoreEvent::TransactionDisposed { .. }))
        }

        pub fn disposed_contexts(&self) -> usize {
            self.count(|e| matches!(e, StoreEvent::ContextDisposed { .. }))
        }

        fn record(&self, event: StoreEvent) {
            self.state.lock().unwrap().events.push(event);
        }

        fn check(&self, point: FailPoint, context: &ContextType) -> StoreResult<()> {
            let state = self.state.lock().unwrap();
            if state.fail_points.contains(&(point, context.clone())) {
                return Err(StoreError::Database(format!(
                    "injected {:?} failure for {}",
                    point, context
                )));
            }
            Ok(())
        }

        fn next_instance(&self) -> usize {
            let mut state = self.state.lock().unwrap();
            state.next_instance += 1;
            state.next_instance
        }
    }

    /// Physical connection stand-in
    #[derive(Debug)]
    pub struct MockConnection {
        pub key: ConnectionKey,
        pub opened_by: usize,
    }

    /// Resolver producing [`RecordingContext`]s; relational unless the store is a document store
    pub struct RecordingResolver {
        journal: StoreJournal,
    }

    impl RecordingResolver {
        pub fn new(journal: StoreJournal) -> Self {
            Self { journal }
        }
    }

    #[async_trait]
    impl ContextResolver for RecordingResolver {
        async fn resolve(&self, options: ResolveOptions) -> StoreResult<Box<dyn PersistenceContext>> {
            self.journal.check(FailPoint::Resolve, &options.context_type)?;

            let instance = self.journal.next_instance();
            let attached = options.existing_connection.is_some();
            let connection = match options.existing_connection {
                Some(existing) => existing,
                None => {
                    let key = options.config.connection_key();
                    let physical = Arc::new(MockConnection {
                        key: key.clone(),
                        opened_by: instance,
                    });
                    SharedConnection::new(key, physical)
                }
            };

            self.journal.record(StoreEvent::Resolved {
                instance,
                context: options.context_type.clone(),
                attached,
            });

            Ok(Box::new(RecordingContext {
                instance,
                context_type: options.context_type,
                relational: options.config.database_type.is_relational(),
                connection,
                transaction: None,
                disposed: false,
                journal: self.journal.clone(),
            }))
        }
    }

    pub struct RecordingContext {
        instance: usize,
        context_type: ContextType,
        relational: bool,
        connection: SharedConnection,
        transaction: Option<TransactionId>,
        disposed: bool,
        journal: StoreJournal,
    }

    impl RecordingContext {
        pub fn instance(&self) -> usize {
            self.instance
        }

        pub fn connection(&self) -> &SharedConnection {
            &self.connection
        }
    }

    #[async_trait]
    impl PersistenceContext for RecordingContext {
        fn context_type(&self) -> &ContextType {
            &self.context_type
        }

        fn supports_shared_relational_transaction(&self) -> bool {
            self.relational
        }

        fn current_transaction(&self) -> Option<TransactionId> {
            self.transaction
        }

        async fn begin_transaction(&mut self) -> StoreResult<Box<dyn TransactionHandle>> {
            self.journal.check(FailPoint::Begin, &self.context_type)?;

            let id = TransactionId::new();
            self.transaction = Some(id);
            self.journal.record(StoreEvent::Began {
                instance: self.instance,
                transaction: id,
            });

            Ok(Box::new(RecordingTransaction {
                id,
                owner: self.context_type.clone(),
                connection: self.connection.clone(),
                open: true,
                disposed: false,
                journal: self.journal.clone(),
            }))
        }

        fn use_transaction(&mut self, transaction: &dyn TransactionHandle) -> StoreResult<()> {
            self.journal.check(FailPoint::Enlist, &self.context_type)?;

            let id = transaction.id();
            self.transaction = Some(id);
            self.journal.record(StoreEvent::Enlisted {
                instance: self.instance,
                transaction: id,
            });
            Ok(())
        }

        async fn dispose(&mut self) -> StoreResult<()> {
            if self.disposed {
                return Err(StoreError::InvalidState(format!(
                    "context instance {} disposed twice",
                    self.instance
                )));
            }
            self.disposed = true;
            self.journal.record(StoreEvent::ContextDisposed {
                instance: self.instance,
            });
            self.journal.check(FailPoint::DisposeContext, &self.context_type)
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    pub struct RecordingTransaction {
        id: TransactionId,
        owner: ContextType,
        connection: SharedConnection,
        open: bool,
        disposed: bool,
        journal: StoreJournal,
    }

    #[async_trait]
    impl TransactionHandle for RecordingTransaction {
        fn id(&self) -> TransactionId {
            self.id
        }

        fn connection(&self) -> SharedConnection {
            self.connection.clone()
        }

        async fn commit(&mut self) -> StoreResult<()> {
            if !self.open {
                return Err(StoreError::InvalidState(format!(
                    "transaction {} is not open",
                    self.id
                )));
            }
            self.journal.check(FailPoint::Commit, &self.owner)?;
            self.open = false;
            self.journal
                .record(StoreEvent::Committed { transaction: self.id });
            Ok(())
        }

        async fn rollback(&mut self) -> StoreResult<()> {
            if !self.open {
                return Ok(());
            }
            self.journal.check(FailPoint::Rollback, &self.owner)?;
            self.open = false;
            self.journal
                .record(StoreEvent::RolledBack { transaction: self.id });
            Ok(())
        }

        async fn dispose(&mut self) -> StoreResult<()> {
            if self.disposed {
                return Err(StoreError::InvalidState(format!(
                    "transaction {} disposed twice",
                    self.id
                )));
            }
            self.disposed = true;
            if self.open {
                self.open = false;
                self.journal
                    .record(StoreEvent::RolledBack { transaction: self.id });
            }
            self.journal
                .record(StoreEvent::TransactionDisposed { transaction: self.id });
            self.journal
                .check(FailPoint::DisposeTransaction, &self.owner)
        }
    }
}
