// Domain Layer - Value types shared by the coordinator and its collaborators

pub mod connection;
pub mod entity;

// Re-exports
pub use connection::{
    ConnectionConfiguration, ConnectionKey, DatabaseType, SharedConnection, TransactionId,
};
pub use entity::{ContextType, Entity, EntityType};
