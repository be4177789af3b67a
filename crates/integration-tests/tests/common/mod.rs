//! Shared fixture: a SQLite file for the relational contexts and an
//! in-process document server for the document contexts.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use unitwork_core::config::DataConfig;
use unitwork_core::domain::{ConnectionConfiguration, ContextType, DatabaseType, Entity};
use unitwork_core::port::{EntityContextMap, RoutingContextResolver};
use unitwork_core::UnitOfWorkFactory;
use unitwork_infra_document::{DocumentContextResolver, DocumentServer};
use unitwork_infra_sqlite::{open_connection, SqliteContextResolver};

pub struct Order;
pub struct Customer;
pub struct Invoice;
pub struct LogEvent;
pub struct AuditEntry;

impl Entity for Order {
    type Key = i64;
}
impl Entity for Customer {
    type Key = i64;
}
impl Entity for Invoice {
    type Key = i64;
}
impl Entity for LogEvent {
    type Key = String;
}
impl Entity for AuditEntry {
    type Key = String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
}

impl LogRecord {
    pub fn info(message: &str) -> Self {
        Self {
            level: "info".to_string(),
            message: message.to_string(),
        }
    }
}

pub fn sales() -> ContextType {
    ContextType::new("SalesDb")
}

pub fn billing() -> ContextType {
    ContextType::new("BillingDb")
}

pub fn logs() -> ContextType {
    ContextType::new("LogStore")
}

/// Document context configured on the SQLite connection string
pub fn audit() -> ContextType {
    ContextType::new("AuditDb")
}

pub const LOG_STORE: &str = "memory://logs";

pub struct Fixture {
    pub factory: UnitOfWorkFactory,
    pub server: Arc<DocumentServer>,
    pub sales_url: String,
    _dir: TempDir,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn sqlite_url(dir: &TempDir) -> String {
    let path: PathBuf = dir.path().join("sales.db");
    format!("sqlite://{}", path.display())
}

pub fn data_config(sales_url: &str) -> DataConfig {
    DataConfig::default()
        .with_context(
            "sales",
            ConnectionConfiguration::new(sales(), sales_url, DatabaseType::Sqlite)
                .with_option("busy_timeout_ms", serde_json::json!(2000)),
        )
        .with_context(
            "billing",
            ConnectionConfiguration::new(billing(), sales_url, DatabaseType::Sqlite),
        )
        .with_context(
            "logs",
            ConnectionConfiguration::new(logs(), LOG_STORE, DatabaseType::Document),
        )
        .with_context(
            "audit",
            ConnectionConfiguration::new(audit(), sales_url, DatabaseType::Document),
        )
}

pub async fn fixture() -> Fixture {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let sales_url = sqlite_url(&dir);
    let config = data_config(&sales_url);
    create_schema(&config).await;

    let locator = EntityContextMap::builder()
        .register::<Order>(sales())
        .register::<Customer>(sales())
        .register::<Invoice>(billing())
        .register::<LogEvent>(logs())
        .register::<AuditEntry>(audit())
        .build()
        .unwrap();

    let server = Arc::new(DocumentServer::new());
    let resolver = RoutingContextResolver::new()
        .route(DatabaseType::Sqlite, Arc::new(SqliteContextResolver::new()))
        .route(
            DatabaseType::Document,
            Arc::new(DocumentContextResolver::new(Arc::clone(&server))),
        );

    let factory = UnitOfWorkFactory::new(Arc::new(locator), Arc::new(config), Arc::new(resolver));

    Fixture {
        factory,
        server,
        sales_url,
        _dir: dir,
    }
}

async fn create_schema(config: &DataConfig) {
    let sales = &config.contexts["sales"];
    let mut conn = open_connection(sales).await.unwrap();

    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL
                REFERENCES customers(id) DEFERRABLE INITIALLY DEFERRED
        )",
        "CREATE TABLE invoices (id INTEGER PRIMARY KEY, order_id INTEGER NOT NULL)",
    ] {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
}

/// Row count seen by a fresh connection, i.e. committed rows only
pub async fn committed_rows(sales_url: &str, table: &str) -> i64 {
    let config = ConnectionConfiguration::new(sales(), sales_url, DatabaseType::Sqlite);
    let mut conn = open_connection(&config).await.unwrap();
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut conn)
        .await
        .unwrap()
}
