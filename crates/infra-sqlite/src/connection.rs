// SQLite Connection Setup & Shared Session

use crate::error::map_sqlx_error;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::debug;
use unitwork_core::domain::{ConnectionConfiguration, ConnectionKey, TransactionId};
use unitwork_core::error::{StoreError, StoreResult};

/// Option key: busy timeout in milliseconds
pub const BUSY_TIMEOUT_OPTION: &str = "busy_timeout_ms";

/// Option key: journal mode (`wal`, `delete`, `truncate`, `persist`, `memory`, `off`)
pub const JOURNAL_MODE_OPTION: &str = "journal_mode";

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Open one SQLite connection with foreign keys on and the configured busy timeout
pub async fn open_connection(config: &ConnectionConfiguration) -> StoreResult<SqliteConnection> {
    let busy_timeout = config
        .option_u64(BUSY_TIMEOUT_OPTION)
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

    let mut options = SqliteConnectOptions::from_str(&config.connection_string)
        .map_err(|e| StoreError::Connection(e.to_string()))?
        .busy_timeout(Duration::from_millis(busy_timeout))
        .foreign_keys(true)
        .create_if_missing(true);

    if let Some(mode) = config.option_str(JOURNAL_MODE_OPTION) {
        options = options.journal_mode(parse_journal_mode(mode)?);
    }

    options.connect().await.map_err(map_sqlx_error)
}

fn parse_journal_mode(mode: &str) -> StoreResult<SqliteJournalMode> {
    match mode.to_ascii_lowercase().as_str() {
        "wal" => Ok(SqliteJournalMode::Wal),
        "delete" => Ok(SqliteJournalMode::Delete),
        "truncate" => Ok(SqliteJournalMode::Truncate),
        "persist" => Ok(SqliteJournalMode::Persist),
        "memory" => Ok(SqliteJournalMode::Memory),
        "off" => Ok(SqliteJournalMode::Off),
        other => Err(StoreError::Unsupported(format!(
            "unknown SQLite journal mode `{}`",
            other
        ))),
    }
}

/// One physical SQLite connection shared by every context attached to it.
///
/// The connection closes when the last attached context is disposed.
pub struct SqliteSession {
    key: ConnectionKey,
    connection: Mutex<Option<SqliteConnection>>,
    active: StdMutex<Option<TransactionId>>,
    attached: AtomicUsize,
}

impl SqliteSession {
    pub async fn open(config: &ConnectionConfiguration) -> StoreResult<Arc<Self>> {
        let connection = open_connection(config).await?;
        debug!(connection = %config.connection_key(), "Opened SQLite connection");
        Ok(Arc::new(Self {
            key: config.connection_key(),
            connection: Mutex::new(Some(connection)),
            active: StdMutex::new(None),
            attached: AtomicUsize::new(0),
        }))
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Transaction currently open on the connection
    pub fn active_transaction(&self) -> Option<TransactionId> {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attached_contexts(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    pub async fn is_closed(&self) -> bool {
        self.connection.lock().await.is_none()
    }

    /// Exclusive access to the connection for running queries
    pub async fn lock(&self) -> StoreResult<MappedMutexGuard<'_, SqliteConnection>> {
        let guard = self.connection.lock().await;
        MutexGuard::try_map(guard, |conn| conn.as_mut()).map_err(|_| {
            StoreError::InvalidState(format!("SQLite connection `{}` is closed", self.key))
        })
    }

    pub(crate) async fn begin(&self, id: TransactionId) -> StoreResult<()> {
        if let Some(open) = self.active_transaction() {
            return Err(StoreError::InvalidState(format!(
                "transaction {} is already open on `{}`",
                open, self.key
            )));
        }

        let mut conn = self.lock().await?;
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        self.set_active(Some(id));
        Ok(())
    }

    /// Run COMMIT or ROLLBACK; the transaction stays open if the statement fails
    pub(crate) async fn finish(&self, statement: &'static str) -> StoreResult<()> {
        let mut conn = self.lock().await?;
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        self.set_active(None);
        Ok(())
    }

    pub(crate) fn attach(&self) {
        self.attached.fetch_add(1, Ordering::AcqRel);
    }

    /// Detach one context; the last one closes the connection
    pub(crate) async fn detach(&self) -> StoreResult<()> {
        if self.attached.fetch_sub(1, Ordering::AcqRel) != 1 {
            return Ok(());
        }

        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.close().await.map_err(map_sqlx_error)?;
            debug!(connection = %self.key, "Closed SQLite connection");
        }
        Ok(())
    }

    fn set_active(&self, id: Option<TransactionId>) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = id;
    }
}
