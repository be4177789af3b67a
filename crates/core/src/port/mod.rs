// Port Layer - Interfaces for external collaborators

pub mod config_provider;
pub mod context;
pub mod context_resolver;
pub mod entity_locator;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use config_provider::ContextConfigProvider;
pub use context::{PersistenceContext, TransactionHandle};
pub use context_resolver::{ContextResolver, ResolveOptions, RoutingContextResolver};
pub use entity_locator::{EntityContextLocator, EntityContextMap, EntityContextMapBuilder};
pub use time_provider::{SystemTimeProvider, TimeProvider};
