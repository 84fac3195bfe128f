//! Component storage
//!
//! One column per component type, keyed by entity slot. Columns are stored
//! type-erased in the world and downcast on typed access.

use super::entity::EntityKey;
use super::Component;
use slotmap::SecondaryMap;
use std::any::{Any, TypeId};

/// Type-erased view of a component column
pub(crate) trait ComponentColumn: Send + Sync {
    /// Name of the stored component type, for diagnostics
    fn type_name(&self) -> &'static str;

    /// `TypeId` of the stored component type
    fn component_type(&self) -> TypeId;

    /// Whether the entity has a component in this column
    fn contains(&self, key: EntityKey) -> bool;

    /// Drop the entity's component, if any
    fn remove_entity(&mut self, key: EntityKey) -> bool;

    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Column of components of a single type
pub(crate) struct ComponentStorage<T: Component> {
    components: SecondaryMap<EntityKey, T>,
}

impl<T: Component> ComponentStorage<T> {
    pub fn new() -> Self {
        Self {
            components: SecondaryMap::new(),
        }
    }

    /// Insert a component, returning the one it replaced
    pub fn insert(&mut self, key: EntityKey, component: T) -> Option<T> {
        self.components.insert(key, component)
    }

    pub fn get(&self, key: EntityKey) -> Option<&T> {
        self.components.get(key)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut T> {
        self.components.get_mut(key)
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<T> {
        self.components.remove(key)
    }
}

impl<T: Component> ComponentColumn for ComponentStorage<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn contains(&self, key: EntityKey) -> bool {
        self.components.contains_key(key)
    }

    fn remove_entity(&mut self, key: EntityKey) -> bool {
        self.components.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.components.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[test]
    fn test_stale_key_misses_after_slot_reuse() {
        let mut slots: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let mut storage = ComponentStorage::<Health>::new();

        let first = slots.insert(());
        storage.insert(first, Health(10));
        slots.remove(first);
        storage.remove_entity(first);

        let reused = slots.insert(());
        storage.insert(reused, Health(20));

        assert_eq!(storage.get(first), None);
        assert_eq!(storage.get(reused), Some(&Health(20)));
        assert_eq!(ComponentColumn::len(&storage), 1);
    }

    #[test]
    fn test_erased_column_downcasts_to_typed() {
        let mut slots: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let key = slots.insert(());

        let mut column: Box<dyn ComponentColumn> = Box::new(ComponentStorage::<Health>::new());
        column
            .as_any_mut()
            .downcast_mut::<ComponentStorage<Health>>()
            .unwrap()
            .insert(key, Health(5));

        assert!(column.contains(key));
        assert_eq!(column.component_type(), TypeId::of::<Health>());
        assert!(column.remove_entity(key));
        assert!(!column.contains(key));
    }
}
