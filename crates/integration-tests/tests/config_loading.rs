//! Data configuration loaded from a file drives a real unit of work.

mod common;

use std::sync::Arc;

use common::*;
use unitwork_core::config::DataConfig;
use unitwork_core::domain::DatabaseType;
use unitwork_core::error::UnitOfWorkError;
use unitwork_core::port::{ContextConfigProvider, EntityContextMap, RoutingContextResolver};
use unitwork_core::UnitOfWorkFactory;
use unitwork_infra_sqlite::{SqliteContext, SqliteContextResolver};

fn write_config(dir: &tempfile::TempDir, sales_url: &str) -> std::path::PathBuf {
    let path = dir.path().join("data.toml");
    let content = format!(
        r#"
[contexts.sales]
context_type = "SalesDb"
connection_string = "{sales_url}"
database_type = "sqlite"

[contexts.sales.options]
busy_timeout_ms = 2500
journal_mode = "wal"

[contexts.logs]
context_type = "LogStore"
connection_string = "memory://logs"
database_type = "document"
"#
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "sqlite://sales.db");

    let config = DataConfig::load(Some(&path)).unwrap();

    let sales = config.config_for(&sales()).unwrap();
    assert_eq!(sales.connection_string, "sqlite://sales.db");
    assert_eq!(sales.database_type, DatabaseType::Sqlite);
    assert_eq!(sales.option_u64("busy_timeout_ms"), Some(2500));
    assert_eq!(sales.option_str("journal_mode"), Some("wal"));

    let logs = config.config_for(&logs()).unwrap();
    assert_eq!(logs.database_type, DatabaseType::Document);

    assert!(matches!(
        config.config_for(&billing()).unwrap_err(),
        UnitOfWorkError::MissingContextConfiguration { .. }
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DataConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, UnitOfWorkError::Config(_)));
}

#[tokio::test]
async fn test_loaded_config_opens_wal_database() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sales_url = sqlite_url(&dir);
    let config = DataConfig::load(Some(&write_config(&dir, &sales_url)))?;

    let locator = EntityContextMap::builder()
        .register::<Customer>(sales())
        .build()?;
    let resolver =
        RoutingContextResolver::new().route(DatabaseType::Sqlite, Arc::new(SqliteContextResolver::new()));
    let factory = UnitOfWorkFactory::new(Arc::new(locator), Arc::new(config), Arc::new(resolver));

    let (mode, timeout) = factory
        .scope(|uow| {
            Box::pin(async move {
                let sales = uow.context_as::<Customer, SqliteContext>().await?;
                let mode = {
                    let mut conn = sales.connection().await?;
                    sqlx::query_scalar::<_, String>("PRAGMA journal_mode")
                        .fetch_one(&mut *conn)
                        .await?
                };
                let timeout = sales.fetch_i64("PRAGMA busy_timeout").await?;
                Ok::<_, anyhow::Error>((mode, timeout))
            })
        })
        .await?;

    assert_eq!(mode, "wal");
    assert_eq!(timeout, 2500);
    Ok(())
}
