// SQLite Persistence Context

use crate::connection::SqliteSession;
use crate::error::map_sqlx_error;
use crate::transaction::SqliteTransaction;
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::MappedMutexGuard;
use unitwork_core::domain::{ContextType, TransactionId};
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::{PersistenceContext, TransactionHandle};

/// Relational context bound to one [`SqliteSession`].
///
/// Several contexts of the same connection can share one transaction; all of
/// them run their statements through the same physical connection.
pub struct SqliteContext {
    context_type: ContextType,
    session: Arc<SqliteSession>,
    transaction: Option<TransactionId>,
    disposed: bool,
}

impl SqliteContext {
    pub(crate) fn attach(context_type: ContextType, session: Arc<SqliteSession>) -> Self {
        session.attach();
        Self {
            context_type,
            session,
            transaction: None,
            disposed: false,
        }
    }

    pub fn session(&self) -> &Arc<SqliteSession> {
        &self.session
    }

    /// Connection for running sqlx queries directly
    pub async fn connection(&self) -> StoreResult<MappedMutexGuard<'_, SqliteConnection>> {
        self.ensure_open()?;
        self.session.lock().await
    }

    /// Execute one statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str) -> StoreResult<u64> {
        let mut conn = self.connection().await?;
        let result = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    /// Fetch a single integer, e.g. `SELECT COUNT(*) ...`
    pub async fn fetch_i64(&self, sql: &str) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)
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
impl PersistenceContext for SqliteContext {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    fn supports_shared_relational_transaction(&self) -> bool {
        true
    }

    fn current_transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    async fn begin_transaction(&mut self) -> StoreResult<Box<dyn TransactionHandle>> {
        self.ensure_open()?;
        let transaction = SqliteTransaction::begin(Arc::clone(&self.session)).await?;
        self.transaction = Some(transaction.id());
        Ok(Box::new(transaction))
    }

    fn use_transaction(&mut self, transaction: &dyn TransactionHandle) -> StoreResult<()> {
        self.ensure_open()?;

        let connection = transaction.connection();
        let same_session = connection
            .downcast::<SqliteSession>()
            .is_some_and(|session| Arc::ptr_eq(&session, &self.session));
        if !same_session {
            return Err(StoreError::IncompatibleConnection(format!(
                "transaction {} does not run on the connection of `{}`",
                transaction.id(),
                self.context_type
            )));
        }

        self.transaction = Some(transaction.id());
        Ok(())
    }

    async fn dispose(&mut self) -> StoreResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.transaction = None;
        self.session.detach().await
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
