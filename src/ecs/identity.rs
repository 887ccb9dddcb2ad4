//! Stable external identifiers for entities.
//!
//! Entity ids are recycled by the world, so anything that outlives a run (save games,
//! network peers) refers to entities through a UUID instead. [`IdentityManager`] keeps the
//! two-way mapping. At any instant at most one entity maps to a given UUID; a UUID taken
//! over by a new entity survives the late release of its previous owner.

use std::{collections::HashMap, sync::RwLock};

use uuid::Uuid;

use crate::ecs::Entity;

#[derive(Debug, Default)]
struct Mappings {
    by_uuid: HashMap<Uuid, Entity>,
    by_entity: HashMap<Entity, Uuid>,
}

impl Mappings {
    fn bind(&mut self, entity: Entity, uuid: Uuid) {
        if let Some(previous) = self.by_entity.insert(entity, uuid) {
            if previous != uuid && self.by_uuid.get(&previous) == Some(&entity) {
                self.by_uuid.remove(&previous);
            }
        }
        if let Some(displaced) = self.by_uuid.insert(uuid, entity) {
            if displaced != entity {
                log::debug!("{uuid} moved from {displaced} to {entity}");
                self.by_entity.remove(&displaced);
            }
        }
    }
}

/// Two-way mapping between entities and UUIDs.
///
/// Every operation takes the internal lock once, so each one is atomic with respect to the
/// others.
///
/// # Examples
///
/// ```rust
/// use weavescope::ecs::{Entity, IdentityManager};
///
/// let manager = IdentityManager::new();
/// let uuid = manager.assign(Entity::new(7), None);
/// assert_eq!(manager.lookup(&uuid), Some(Entity::new(7)));
///
/// manager.release(Entity::new(7));
/// assert_eq!(manager.lookup(&uuid), None);
/// ```
#[derive(Debug, Default)]
pub struct IdentityManager {
    mappings: RwLock<Mappings>,
}

impl IdentityManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `entity` an identifier, generating a random one when `uuid` is `None`.
    ///
    /// An entity that already had a different identifier loses it. Returns the identifier
    /// now bound to the entity.
    pub fn assign(&self, entity: Entity, uuid: Option<Uuid>) -> Uuid {
        let uuid = uuid.unwrap_or_else(Uuid::new_v4);
        self.write().bind(entity, uuid);
        uuid
    }

    /// Replace the identifier of `entity`, removing the old mapping in the same step.
    pub fn reassign(&self, entity: Entity, uuid: Uuid) {
        self.write().bind(entity, uuid);
    }

    /// The entity currently holding `uuid`.
    #[must_use]
    pub fn lookup(&self, uuid: &Uuid) -> Option<Entity> {
        self.read().by_uuid.get(uuid).copied()
    }

    /// The identifier of `entity`.
    #[must_use]
    pub fn uuid_of(&self, entity: Entity) -> Option<Uuid> {
        self.read().by_entity.get(&entity).copied()
    }

    /// Forget `entity` after its deletion.
    ///
    /// The UUID mapping is only removed while it still points at `entity`, so an identifier
    /// already handed to a newer entity stays valid.
    pub fn release(&self, entity: Entity) {
        let mut mappings = self.write();
        if let Some(uuid) = mappings.by_entity.remove(&entity) {
            if mappings.by_uuid.get(&uuid) == Some(&entity) {
                mappings.by_uuid.remove(&uuid);
            }
        }
    }

    /// Number of entities with an identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_entity.len()
    }

    /// Returns true if no entity has an identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().by_entity.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Mappings> {
        self.mappings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Mappings> {
        self.mappings
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
