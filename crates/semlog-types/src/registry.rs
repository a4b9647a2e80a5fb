//! Entity lookup by host handle.
//!
//! The host owns its actors; the logger only ever resolves handles to
//! semantic descriptions. Lookups may fail for actors that carry no semantic
//! tags, and callers are expected to skip those silently.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::entity::{Entity, EntityHandle, EntityKind, EntityRecord};
use crate::ids::EntityId;

/// Errors that can occur when registering entities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The entity has no semantic id or class.
    #[error("entity {handle} is not semantically tagged (id or class missing)")]
    Untagged {
        /// Handle that was being registered.
        handle: EntityHandle,
    },

    /// Another handle is already registered under the same persistent id.
    #[error("entity id {id} is already registered to handle {existing}")]
    DuplicateId {
        /// The conflicting persistent id.
        id: EntityId,
        /// Handle already holding the id.
        existing: EntityHandle,
    },
}

/// Source of semantic entity descriptions.
pub trait EntityRegistry: Send + Sync {
    /// Resolve a host handle. `None` for untagged or unknown handles.
    fn lookup(&self, handle: EntityHandle) -> Option<Entity>;

    /// Every registered entity, ordered by handle.
    fn entities(&self) -> Vec<EntityRecord>;
}

/// Thread-safe registry held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: RwLock<BTreeMap<EntityHandle, EntityRecord>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an entity under its handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Untagged`] if the id or class is empty, and
    /// [`RegistryError::DuplicateId`] if the id belongs to another handle.
    pub fn register(&self, entity: Entity, kind: EntityKind) -> Result<(), RegistryError> {
        if entity.id.is_empty() || entity.class.is_empty() {
            return Err(RegistryError::Untagged {
                handle: entity.handle,
            });
        }

        let mut records = self.records.write();
        if let Some(existing) = records
            .values()
            .find(|r| r.entity.id == entity.id && r.entity.handle != entity.handle)
        {
            return Err(RegistryError::DuplicateId {
                id: entity.id,
                existing: existing.entity.handle,
            });
        }

        records.insert(entity.handle, EntityRecord { entity, kind });
        Ok(())
    }

    /// Forget a handle. Returns the removed record, if any.
    pub fn unregister(&self, handle: EntityHandle) -> Option<EntityRecord> {
        self.records.write().remove(&handle)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EntityRegistry for InMemoryRegistry {
    fn lookup(&self, handle: EntityHandle) -> Option<Entity> {
        self.records.read().get(&handle).map(|r| r.entity.clone())
    }

    fn entities(&self) -> Vec<EntityRecord> {
        self.records.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_registered_entity() {
        let registry = InMemoryRegistry::new();
        let cup = Entity::new("Cup_1", "Cup", EntityHandle(10));
        assert!(registry.register(cup.clone(), EntityKind::Dynamic).is_ok());

        assert_eq!(registry.lookup(EntityHandle(10)), Some(cup));
        let records = registry.entities();
        assert_eq!(records.first().map(|r| r.kind), Some(EntityKind::Dynamic));
        assert_eq!(registry.lookup(EntityHandle(11)), None);
    }

    #[test]
    fn untagged_entities_are_rejected() {
        let registry = InMemoryRegistry::new();
        let result = registry.register(Entity::new("", "Cup", EntityHandle(1)), EntityKind::Static);
        assert_eq!(
            result,
            Err(RegistryError::Untagged {
                handle: EntityHandle(1)
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_ids_on_other_handles_are_rejected() {
        let registry = InMemoryRegistry::new();
        let _ = registry.register(Entity::new("Cup_1", "Cup", EntityHandle(1)), EntityKind::Dynamic);
        let result =
            registry.register(Entity::new("Cup_1", "Cup", EntityHandle(2)), EntityKind::Dynamic);
        assert!(matches!(result, Err(RegistryError::DuplicateId { .. })));

        // Re-registering the same handle is an update.
        let result =
            registry.register(Entity::new("Cup_1", "Mug", EntityHandle(1)), EntityKind::Dynamic);
        assert!(result.is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn entities_are_ordered_by_handle() {
        let registry = InMemoryRegistry::new();
        let _ = registry.register(Entity::new("B", "Box", EntityHandle(7)), EntityKind::Static);
        let _ = registry.register(Entity::new("A", "Apple", EntityHandle(3)), EntityKind::Dynamic);
        let ids: Vec<_> = registry
            .entities()
            .into_iter()
            .map(|r| r.entity.handle)
            .collect();
        assert_eq!(ids, vec![EntityHandle(3), EntityHandle(7)]);
    }
}
