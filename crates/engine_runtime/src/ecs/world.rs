//! ECS World implementation

use super::entity::EntityKey;
use super::storage::{ComponentColumn, ComponentStorage};
use super::{Component, Entity, ModuleState};
use crate::events::{Delivery, EventBus, WorldWasCreated, WorldWasDestroyed};
use slotmap::SlotMap;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique world identity
///
/// Subsystems key their per-world state by this value rather than holding
/// references to the world itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(u64);

impl WorldId {
    fn next() -> Self {
        Self(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// Why an entity handle was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidEntityReason {
    /// The entity belongs to a different world
    Foreign,
    /// The entity was destroyed (or its slot reused)
    Destroyed,
}

impl fmt::Display for InvalidEntityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreign => f.write_str("entity belongs to another world"),
            Self::Destroyed => f.write_str("entity was destroyed"),
        }
    }
}

/// ECS errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Operation on an entity this world does not own
    #[error("invalid entity {entity}: {reason}")]
    InvalidEntity {
        /// Rejected handle
        entity: Entity,
        /// Why it was rejected
        reason: InvalidEntityReason,
    },

    /// The world was already announced on an event bus
    #[error("{0} has already been announced")]
    AlreadyAnnounced(WorldId),
}

struct EntityRecord {
    sequence: u64,
}

/// ECS World containing all entities and components
///
/// A world created with [`World::new`] is detached. Once announced on an
/// [`EventBus`] it publishes [`WorldWasCreated`], and dropping it publishes
/// [`WorldWasDestroyed`] before any component is released.
pub struct World {
    id: WorldId,
    entities: SlotMap<EntityKey, EntityRecord>,
    /// Creation sequence -> entity, for deterministic iteration
    creation_order: BTreeMap<u64, EntityKey>,
    next_sequence: u64,
    component_storages: HashMap<TypeId, Box<dyn ComponentColumn>>,
    module_state: ModuleState,
    events: Option<Arc<EventBus>>,
}

impl World {
    /// Create a new detached world
    pub fn new() -> Self {
        Self {
            id: WorldId::next(),
            entities: SlotMap::with_key(),
            creation_order: BTreeMap::new(),
            next_sequence: 0,
            component_storages: HashMap::new(),
            module_state: ModuleState::new(),
            events: None,
        }
    }

    /// Identity of this world
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Attach the world to `events` and publish [`WorldWasCreated`]
    ///
    /// Every current subscriber has run by the time this returns.
    pub fn announce(&mut self, events: Arc<EventBus>) -> Result<Delivery, EcsError> {
        if self.events.is_some() {
            return Err(EcsError::AlreadyAnnounced(self.id));
        }

        let delivery = events.publish(&WorldWasCreated {
            world: self.id,
            module_state: self.module_state.clone(),
        });
        self.events = Some(events);

        log::debug!(
            "Announced {} to {} subscriber(s) ({} failed)",
            self.id,
            delivery.delivered,
            delivery.failures.len()
        );
        Ok(delivery)
    }

    /// Whether lifecycle events are published for this world
    pub fn is_announced(&self) -> bool {
        self.events.is_some()
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let key = self.entities.insert(EntityRecord { sequence });
        self.creation_order.insert(sequence, key);
        Entity::new(self.id, key)
    }

    /// Destroy an entity and all of its components
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        let key = self.validate(entity)?;
        for storage in self.component_storages.values_mut() {
            storage.remove_entity(key);
        }
        if let Some(record) = self.entities.remove(key) {
            self.creation_order.remove(&record.sequence);
        }
        Ok(())
    }

    /// Whether `entity` is alive in this world
    pub fn contains(&self, entity: Entity) -> bool {
        self.validate(entity).is_ok()
    }

    /// Add a component to an entity, returning the component it replaced
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<Option<T>, EcsError> {
        let key = self.validate(entity)?;
        Ok(self.storage_mut::<T>().insert(key, component))
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<Option<&T>, EcsError> {
        let key = self.validate(entity)?;
        Ok(self.storage::<T>().and_then(|storage| storage.get(key)))
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>, EcsError> {
        let key = self.validate(entity)?;
        Ok(self
            .component_storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<ComponentStorage<T>>())
            .and_then(|storage| storage.get_mut(key)))
    }

    /// Remove a component from an entity
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, EcsError> {
        let key = self.validate(entity)?;
        Ok(self
            .component_storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<ComponentStorage<T>>())
            .and_then(|storage| storage.remove(key)))
    }

    /// Whether the entity has a component of type `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> Result<bool, EcsError> {
        Ok(self.get_component::<T>(entity)?.is_some())
    }

    /// All entities with a `T`, in creation order
    pub fn query<T: Component>(&self) -> Vec<(Entity, &T)> {
        let Some(storage) = self.storage::<T>() else {
            return Vec::new();
        };
        self.creation_order
            .values()
            .filter_map(|&key| storage.get(key).map(|component| (Entity::new(self.id, key), component)))
            .collect()
    }

    /// Live entities in creation order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.creation_order
            .values()
            .map(move |&key| Entity::new(self.id, key))
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of components across all entities
    pub fn component_count(&self) -> usize {
        self.component_storages.values().map(|storage| storage.len()).sum()
    }

    /// Component types attached to `entity` as `(TypeId, type name)` pairs
    pub(crate) fn component_types(&self, entity: Entity) -> Result<Vec<(TypeId, &'static str)>, EcsError> {
        let key = self.validate(entity)?;
        Ok(self
            .component_storages
            .values()
            .filter(|storage| storage.contains(key))
            .map(|storage| (storage.component_type(), storage.type_name()))
            .collect())
    }

    /// Subsystem state persisted with this world
    pub fn module_state(&self) -> &ModuleState {
        &self.module_state
    }

    /// Mutable subsystem state persisted with this world
    pub fn module_state_mut(&mut self) -> &mut ModuleState {
        &mut self.module_state
    }

    fn validate(&self, entity: Entity) -> Result<EntityKey, EcsError> {
        if entity.world() != self.id {
            return Err(EcsError::InvalidEntity {
                entity,
                reason: InvalidEntityReason::Foreign,
            });
        }
        if !self.entities.contains_key(entity.key()) {
            return Err(EcsError::InvalidEntity {
                entity,
                reason: InvalidEntityReason::Destroyed,
            });
        }
        Ok(entity.key())
    }

    fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.component_storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<ComponentStorage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .component_storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::new()));
        match storage.as_any_mut().downcast_mut::<ComponentStorage<T>>() {
            Some(storage) => storage,
            // Columns are only ever inserted under their own TypeId
            None => unreachable!("component column registered under a foreign TypeId"),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("entities", &self.entities.len())
            .field("components", &self.component_count())
            .field("announced", &self.events.is_some())
            .finish()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if let Some(events) = self.events.take() {
            let delivery = events.publish(&WorldWasDestroyed { world: self.id });
            log::debug!(
                "Destroyed {} ({} subscriber(s) notified)",
                self.id,
                delivery.delivered
            );
        }
    }
}
