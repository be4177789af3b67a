// SQLite Transaction Implementation

use crate::connection::SqliteSession;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use unitwork_core::domain::{SharedConnection, TransactionId};
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::TransactionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    RolledBack,
    Disposed,
}

/// Transaction opened with BEGIN on a shared [`SqliteSession`]
pub struct SqliteTransaction {
    id: TransactionId,
    session: Arc<SqliteSession>,
    state: TransactionState,
}

impl SqliteTransaction {
    pub(crate) async fn begin(session: Arc<SqliteSession>) -> StoreResult<Self> {
        let id = TransactionId::new();
        session.begin(id).await?;
        debug!(connection = %session.key(), transaction = %id, "BEGIN");

        Ok(Self {
            id,
            session,
            state: TransactionState::Active,
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }
}

#[async_trait]
impl TransactionHandle for SqliteTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn connection(&self) -> SharedConnection {
        SharedConnection::new(self.session.key().clone(), Arc::clone(&self.session))
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(StoreError::InvalidState(format!(
                "transaction {} is {:?}, cannot commit",
                self.id, self.state
            )));
        }

        // A failed COMMIT (e.g. deferred constraint) leaves the transaction open
        self.session.finish("COMMIT").await?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if self.state != TransactionState::Active {
            return Ok(());
        }

        self.session.finish("ROLLBACK").await?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    async fn dispose(&mut self) -> StoreResult<()> {
        if self.state == TransactionState::Disposed {
            return Ok(());
        }

        let result = self.rollback().await;
        self.state = TransactionState::Disposed;
        result
    }
}
