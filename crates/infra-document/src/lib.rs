// Unitwork Infrastructure - Document Store Adapter
// Implements: PersistenceContext, TransactionHandle, ContextResolver
// Document contexts never share a physical transaction with other contexts.

mod context;
mod resolver;
mod store;
mod transaction;

pub use context::DocumentContext;
pub use resolver::DocumentContextResolver;
pub use store::{DocumentServer, DocumentStore, DocumentWrite};
pub use transaction::DocumentTransaction;
