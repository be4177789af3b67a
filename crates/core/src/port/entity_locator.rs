// Entity-to-Context Locator Port

use crate::domain::{ContextType, Entity, EntityType};
use crate::error::{Result, UnitOfWorkError};
use std::collections::{BTreeMap, HashMap};

/// Maps an entity type to the persistence context that owns it.
///
/// Answers must be stable for the lifetime of the process.
#[cfg_attr(test, mockall::automock)]
pub trait EntityContextLocator: Send + Sync {
    /// Fails with `UnknownEntityContext` if no context claims `entity`
    fn owner_of(&self, entity: &EntityType) -> Result<ContextType>;
}

/// Immutable entity-to-context mapping, built once at startup and shared by reference
#[derive(Debug, Clone, Default)]
pub struct EntityContextMap {
    owners: HashMap<EntityType, ContextType>,
    entities: BTreeMap<ContextType, Vec<EntityType>>,
}

impl EntityContextMap {
    pub fn builder() -> EntityContextMapBuilder {
        EntityContextMapBuilder::default()
    }

    /// Entity types owned by `context`, in registration order
    pub fn entities_of(&self, context: &ContextType) -> &[EntityType] {
        self.entities
            .get(context)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &ContextType> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl EntityContextLocator for EntityContextMap {
    fn owner_of(&self, entity: &EntityType) -> Result<ContextType> {
        self.owners
            .get(entity)
            .cloned()
            .ok_or_else(|| UnitOfWorkError::UnknownEntityContext {
                entity: entity.clone(),
            })
    }
}

/// Collects registrations; conflicts are reported by [`EntityContextMapBuilder::build`]
#[derive(Debug, Default)]
pub struct EntityContextMapBuilder {
    registrations: Vec<(EntityType, ContextType)>,
}

impl EntityContextMapBuilder {
    pub fn register<E: Entity>(self, context: ContextType) -> Self {
        self.register_type(E::entity_type(), context)
    }

    /// Register `E` with the default context
    pub fn register_default<E: Entity>(self) -> Self {
        self.register_type(E::entity_type(), ContextType::default_context())
    }

    pub fn register_type(mut self, entity: EntityType, context: ContextType) -> Self {
        self.registrations.push((entity, context));
        self
    }

    pub fn build(self) -> Result<EntityContextMap> {
        let mut map = EntityContextMap::default();

        for (entity, context) in self.registrations {
            match map.owners.get(&entity) {
                Some(owner) if *owner == context => continue,
                Some(owner) => {
                    return Err(UnitOfWorkError::Mapping(format!(
                        "entity `{}` is claimed by both `{}` and `{}`",
                        entity, owner, context
                    )));
                }
                None => {}
            }

            map.entities
                .entry(context.clone())
                .or_default()
                .push(entity.clone());
            map.owners.insert(entity, context);
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;
    struct Customer;
    struct Setting;

    impl Entity for Order {
        type Key = i64;
    }
    impl Entity for Customer {
        type Key = String;
    }
    impl Entity for Setting {
        type Key = u32;
    }

    fn sales() -> ContextType {
        ContextType::new("SalesDb")
    }

    #[test]
    fn test_owner_of_registered_entities() {
        let map = EntityContextMap::builder()
            .register::<Order>(sales())
            .register::<Customer>(sales())
            .register_default::<Setting>()
            .build()
            .unwrap();

        assert_eq!(map.owner_of(&Order::entity_type()).unwrap(), sales());
        assert_eq!(map.owner_of(&Customer::entity_type()).unwrap(), sales());
        assert!(map.owner_of(&Setting::entity_type()).unwrap().is_default());
        assert_eq!(
            map.entities_of(&sales()),
            &[Order::entity_type(), Customer::entity_type()]
        );
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_unknown_entity() {
        let map = EntityContextMap::builder()
            .register::<Order>(sales())
            .build()
            .unwrap();

        let err = map.owner_of(&Customer::entity_type()).unwrap_err();
        assert!(matches!(err, UnitOfWorkError::UnknownEntityContext { .. }));
        assert!(map.entities_of(&ContextType::new("Nope")).is_empty());
    }

    #[test]
    fn test_conflicting_registration_rejected() {
        let result = EntityContextMap::builder()
            .register::<Order>(sales())
            .register::<Order>(ContextType::new("ArchiveDb"))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("claimed by both"));
    }

    #[test]
    fn test_repeated_registration_is_idempotent() {
        let map = EntityContextMap::builder()
            .register::<Order>(sales())
            .register::<Order>(sales())
            .build()
            .unwrap();

        assert_eq!(map.entities_of(&sales()).len(), 1);
    }
}
