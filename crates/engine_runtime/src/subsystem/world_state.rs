//! Per-world subsystem state keyed by world identity

use crate::ecs::WorldId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Map from [`WorldId`] to a subsystem's parallel state for that world
///
/// Cloning shares the map, so lifecycle handlers and the owning subsystem
/// see the same entries. Entries are created on `WorldWasCreated` and
/// removed on `WorldWasDestroyed`.
pub struct PerWorldState<S> {
    states: Arc<Mutex<BTreeMap<WorldId, Arc<Mutex<S>>>>>,
}

impl<S> PerWorldState<S> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Store state for `world`, replacing any previous entry
    pub fn insert(&self, world: WorldId, state: S) -> Arc<Mutex<S>> {
        let state = Arc::new(Mutex::new(state));
        let previous = self.states.lock().insert(world, Arc::clone(&state));
        if previous.is_some() {
            log::warn!("Replaced existing subsystem state for {}", world);
        }
        state
    }

    /// Store state for `world` unless it already has some
    pub fn get_or_insert_with(&self, world: WorldId, make: impl FnOnce() -> S) -> Arc<Mutex<S>> {
        Arc::clone(
            self.states
                .lock()
                .entry(world)
                .or_insert_with(|| Arc::new(Mutex::new(make()))),
        )
    }

    /// State for `world`
    pub fn get(&self, world: WorldId) -> Option<Arc<Mutex<S>>> {
        self.states.lock().get(&world).cloned()
    }

    /// Drop the state for `world`
    pub fn remove(&self, world: WorldId) -> Option<Arc<Mutex<S>>> {
        self.states.lock().remove(&world)
    }

    /// Whether `world` has state
    pub fn contains(&self, world: WorldId) -> bool {
        self.states.lock().contains_key(&world)
    }

    /// Worlds with state, in identity order
    pub fn worlds(&self) -> Vec<WorldId> {
        self.states.lock().keys().copied().collect()
    }

    /// Number of worlds with state
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Whether no world has state
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        // Entries drop after the map lock is released
        let drained = std::mem::take(&mut *self.states.lock());
        drop(drained);
    }
}

impl<S> Clone for PerWorldState<S> {
    fn clone(&self) -> Self {
        Self {
            states: Arc::clone(&self.states),
        }
    }
}

impl<S> Default for PerWorldState<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for PerWorldState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerWorldState")
            .field("worlds", &self.worlds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    #[test]
    fn test_clones_share_entries() {
        let world = World::new();
        let states: PerWorldState<u32> = PerWorldState::new();
        let handler_view = states.clone();

        handler_view.insert(world.id(), 7);
        assert_eq!(states.get(world.id()).map(|s| *s.lock()), Some(7));

        *states.get_or_insert_with(world.id(), || 0).lock() += 1;
        assert_eq!(*handler_view.get(world.id()).unwrap().lock(), 8);

        assert!(states.remove(world.id()).is_some());
        assert!(handler_view.is_empty());
    }
}
