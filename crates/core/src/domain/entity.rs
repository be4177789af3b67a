// Entity & Context Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker for persisted entity types.
///
/// The key type only exists for static typing at call sites; the coordinator
/// never looks at it.
pub trait Entity: 'static {
    type Key: Eq;

    /// Runtime identity used by the entity-to-context locator
    fn entity_type() -> EntityType {
        EntityType::of::<Self>()
    }
}

/// Runtime identity of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity derived from the Rust type name
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a persistence context (one data model bound to one connection configuration)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextType(String);

impl ContextType {
    const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Context that owns entities registered without an explicit context
    pub fn default_context() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    impl Entity for Order {
        type Key = i64;
    }

    #[test]
    fn test_entity_type_uses_type_name() {
        let entity = Order::entity_type();
        assert_eq!(entity, EntityType::of::<Order>());
        assert!(entity.as_str().ends_with("Order"));
    }

    #[test]
    fn test_default_context() {
        assert!(ContextType::default_context().is_default());
        assert!(!ContextType::new("SalesDb").is_default());
    }
}
