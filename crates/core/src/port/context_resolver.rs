// Context Resolver Port

use crate::domain::{ConnectionConfiguration, ContextType, DatabaseType, SharedConnection};
use crate::error::{StoreError, StoreResult};
use crate::port::PersistenceContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Inputs for creating one context instance; built fresh for every resolve call
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub context_type: ContextType,
    pub config: ConnectionConfiguration,

    /// Connection of the active transaction to attach to, when joining
    pub existing_connection: Option<SharedConnection>,
}

impl ResolveOptions {
    pub fn new(context_type: ContextType, config: ConnectionConfiguration) -> Self {
        Self {
            context_type,
            config,
            existing_connection: None,
        }
    }

    pub fn attached_to(mut self, connection: SharedConnection) -> Self {
        self.existing_connection = Some(connection);
        self
    }
}

/// Produces ready context instances.
///
/// When `existing_connection` is set the new context must run on that
/// connection instead of opening its own.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    async fn resolve(&self, options: ResolveOptions) -> StoreResult<Box<dyn PersistenceContext>>;
}

/// Dispatches to adapter resolvers by database type
#[derive(Default)]
pub struct RoutingContextResolver {
    routes: HashMap<DatabaseType, Arc<dyn ContextResolver>>,
}

impl RoutingContextResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, database_type: DatabaseType, resolver: Arc<dyn ContextResolver>) -> Self {
        self.routes.insert(database_type, resolver);
        self
    }
}

#[async_trait]
impl ContextResolver for RoutingContextResolver {
    async fn resolve(&self, options: ResolveOptions) -> StoreResult<Box<dyn PersistenceContext>> {
        let database_type = options.config.database_type;
        let resolver = self.routes.get(&database_type).ok_or_else(|| {
            StoreError::Unsupported(format!(
                "no resolver registered for database type `{}`",
                database_type
            ))
        })?;

        debug!(
            context = %options.context_type,
            database_type = %database_type,
            "Routing context resolve"
        );
        resolver.resolve(options).await
    }
}
