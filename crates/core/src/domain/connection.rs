// Connection Domain Model

use crate::domain::ContextType;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a physical connection (the connection string).
///
/// Two contexts whose configurations yield the same key are grouped under one
/// active transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store behind a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sqlite,
    PostgreSql,
    MySql,
    SqlServer,
    /// Document / key-value store without relational transactions
    Document,
}

impl DatabaseType {
    pub fn is_relational(&self) -> bool {
        !matches!(self, DatabaseType::Document)
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
            DatabaseType::PostgreSql => write!(f, "postgresql"),
            DatabaseType::MySql => write!(f, "mysql"),
            DatabaseType::SqlServer => write!(f, "sqlserver"),
            DatabaseType::Document => write!(f, "document"),
        }
    }
}

/// Connection configuration of one persistence context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfiguration {
    pub context_type: ContextType,
    pub connection_string: String,
    pub database_type: DatabaseType,

    /// Store-specific options (e.g. `busy_timeout_ms` for SQLite)
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ConnectionConfiguration {
    pub fn new(
        context_type: ContextType,
        connection_string: impl Into<String>,
        database_type: DatabaseType,
    ) -> Self {
        Self {
            context_type,
            connection_string: connection_string.into(),
            database_type,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.connection_string.clone())
    }

    /// Numeric option; quoted numbers (`"2500"`) are accepted too
    pub fn option_u64(&self, name: &str) -> Option<u64> {
        match self.options.get(name)? {
            serde_json::Value::String(text) => text.trim().parse().ok(),
            value => value.as_u64(),
        }
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(serde_json::Value::as_str)
    }
}

/// Identity of one physical transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-erased physical connection handed from a record's transaction to the
/// resolver of a joining context. Adapters downcast it to their own connection type.
#[derive(Clone)]
pub struct SharedConnection {
    key: ConnectionKey,
    inner: Arc<dyn Any + Send + Sync>,
}

impl SharedConnection {
    pub fn new<C: Any + Send + Sync>(key: ConnectionKey, connection: Arc<C>) -> Self {
        Self {
            key,
            inner: connection,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Returns the adapter connection, or `None` if it belongs to another store
    pub fn downcast<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.inner).downcast::<C>().ok()
    }
}

impl fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_key_is_connection_string() {
        let config = ConnectionConfiguration::new(
            ContextType::new("SalesDb"),
            "sqlite://sales.db",
            DatabaseType::Sqlite,
        );
        assert_eq!(config.connection_key(), ConnectionKey::new("sqlite://sales.db"));
    }

    #[test]
    fn test_options() {
        let config = ConnectionConfiguration::new(
            ContextType::new("SalesDb"),
            "sqlite://sales.db",
            DatabaseType::Sqlite,
        )
        .with_option("busy_timeout_ms", serde_json::json!(250))
        .with_option("journal_mode", serde_json::json!("wal"))
        .with_option("max_pages", serde_json::json!("64"));

        assert_eq!(config.option_u64("busy_timeout_ms"), Some(250));
        assert_eq!(config.option_u64("max_pages"), Some(64));
        assert_eq!(config.option_u64("journal_mode"), None);
        assert_eq!(config.option_str("journal_mode"), Some("wal"));
        assert_eq!(config.option_u64("missing"), None);
    }

    #[test]
    fn test_shared_connection_downcast() {
        struct Conn(u8);
        let shared = SharedConnection::new(ConnectionKey::new("A"), Arc::new(Conn(7)));

        assert_eq!(shared.downcast::<Conn>().map(|c| c.0), Some(7));
        assert!(shared.downcast::<String>().is_none());
    }

    #[test]
    fn test_document_is_not_relational() {
        assert!(DatabaseType::Sqlite.is_relational());
        assert!(!DatabaseType::Document.is_relational());
    }
}
