// SQLite Context Resolver

use crate::connection::SqliteSession;
use crate::context::SqliteContext;
use async_trait::async_trait;
use tracing::debug;
use unitwork_core::domain::DatabaseType;
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::{ContextResolver, PersistenceContext, ResolveOptions};

/// Opens a new SQLite connection for each starter and attaches joiners to the existing one
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteContextResolver;

impl SqliteContextResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextResolver for SqliteContextResolver {
    async fn resolve(&self, options: ResolveOptions) -> StoreResult<Box<dyn PersistenceContext>> {
        if options.config.database_type != DatabaseType::Sqlite {
            return Err(StoreError::Unsupported(format!(
                "SQLite resolver cannot serve `{}` ({})",
                options.context_type, options.config.database_type
            )));
        }

        let session = match options.existing_connection {
            Some(existing) => existing.downcast::<SqliteSession>().ok_or_else(|| {
                StoreError::IncompatibleConnection(format!(
                    "connection `{}` is not a SQLite connection",
                    existing.key()
                ))
            })?,
            None => SqliteSession::open(&options.config).await?,
        };

        debug!(
            context = %options.context_type,
            connection = %session.key(),
            attached = session.attached_contexts(),
            "Resolved SQLite context"
        );
        Ok(Box::new(SqliteContext::attach(options.context_type, session)))
    }
}
