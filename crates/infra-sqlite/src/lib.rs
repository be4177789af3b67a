// Unitwork Infrastructure - SQLite Adapter
// Implements: PersistenceContext, TransactionHandle, ContextResolver

mod connection;
mod context;
mod error;
mod resolver;
mod transaction;

pub use connection::{
    open_connection, SqliteSession, BUSY_TIMEOUT_OPTION, DEFAULT_BUSY_TIMEOUT_MS,
    JOURNAL_MODE_OPTION,
};
pub use context::SqliteContext;
pub use resolver::SqliteContextResolver;
pub use transaction::SqliteTransaction;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for StoreError here)
