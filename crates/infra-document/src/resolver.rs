// Document Store Context Resolver

use crate::context::DocumentContext;
use crate::store::{DocumentServer, DocumentStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use unitwork_core::domain::DatabaseType;
use unitwork_core::error::{StoreError, StoreResult};
use unitwork_core::port::{ContextResolver, PersistenceContext, ResolveOptions};

/// Resolves document contexts against the stores of one [`DocumentServer`]
#[derive(Clone)]
pub struct DocumentContextResolver {
    server: Arc<DocumentServer>,
}

impl DocumentContextResolver {
    pub fn new(server: Arc<DocumentServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &Arc<DocumentServer> {
        &self.server
    }
}

#[async_trait]
impl ContextResolver for DocumentContextResolver {
    async fn resolve(&self, options: ResolveOptions) -> StoreResult<Box<dyn PersistenceContext>> {
        if options.config.database_type != DatabaseType::Document {
            return Err(StoreError::Unsupported(format!(
                "document resolver cannot serve `{}` ({})",
                options.context_type, options.config.database_type
            )));
        }

        // A relational record on the same key has nothing to share: the document
        // context runs its own transaction against the store it names.
        let store = match options
            .existing_connection
            .as_ref()
            .and_then(|existing| existing.downcast::<DocumentStore>())
        {
            Some(store) => store,
            None => {
                if let Some(existing) = &options.existing_connection {
                    debug!(
                        context = %options.context_type,
                        connection = %existing.key(),
                        "Existing connection is not a document store; opening own store"
                    );
                }
                self.server.open(&options.config.connection_string)
            }
        };

        debug!(
            context = %options.context_type,
            store = %store.name(),
            "Resolved document context"
        );
        Ok(Box::new(DocumentContext::new(options.context_type, store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitwork_core::domain::{
        ConnectionConfiguration, ConnectionKey, ContextType, SharedConnection,
    };

    fn options(database_type: DatabaseType) -> ResolveOptions {
        let context_type = ContextType::new("LogStore");
        ResolveOptions::new(
            context_type.clone(),
            ConnectionConfiguration::new(context_type, "logs", database_type),
        )
    }

    #[tokio::test]
    async fn test_resolves_store_named_by_connection_string() {
        let server = Arc::new(DocumentServer::new());
        let resolver = DocumentContextResolver::new(Arc::clone(&server));

        let mut context = resolver.resolve(options(DatabaseType::Document)).await.unwrap();
        let document = context.as_any_mut().downcast_mut::<DocumentContext>().unwrap();

        assert_eq!(document.store().name(), "logs");
        assert!(server.store("logs").is_some());
    }

    #[tokio::test]
    async fn test_attaches_to_existing_store() {
        let server = Arc::new(DocumentServer::new());
        let resolver = DocumentContextResolver::new(Arc::clone(&server));

        let mut starter = resolver.resolve(options(DatabaseType::Document)).await.unwrap();
        let tx = starter.begin_transaction().await.unwrap();

        let mut joiner = resolver
            .resolve(options(DatabaseType::Document).attached_to(tx.connection()))
            .await
            .unwrap();
        let joined = joiner.as_any_mut().downcast_mut::<DocumentContext>().unwrap();

        assert!(Arc::ptr_eq(joined.store(), &server.open("logs")));
    }

    #[tokio::test]
    async fn test_foreign_connection_opens_own_store() {
        struct RelationalSession;
        let server = Arc::new(DocumentServer::new());
        let resolver = DocumentContextResolver::new(Arc::clone(&server));
        let foreign =
            SharedConnection::new(ConnectionKey::new("logs"), Arc::new(RelationalSession));

        let mut context = resolver
            .resolve(options(DatabaseType::Document).attached_to(foreign))
            .await
            .unwrap();
        let document = context.as_any_mut().downcast_mut::<DocumentContext>().unwrap();

        assert!(Arc::ptr_eq(document.store(), &server.open("logs")));
        assert!(document.begin_transaction().await.is_ok());
    }

    #[tokio::test]
    async fn test_relational_type_unsupported() {
        let resolver = DocumentContextResolver::new(Arc::new(DocumentServer::new()));

        let err = resolver
            .resolve(options(DatabaseType::Sqlite))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
