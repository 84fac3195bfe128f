//! Entity implementation

use super::WorldId;
use std::fmt;

slotmap::new_key_type! {
    /// Slot key of an entity inside its world's arena
    pub(crate) struct EntityKey;
}

/// Entity identifier
///
/// A slot index plus generation, tagged with the owning world so handles
/// from another world are rejected instead of aliasing a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    world: WorldId,
    key: EntityKey,
}

impl Entity {
    pub(super) fn new(world: WorldId, key: EntityKey) -> Self {
        Self { world, key }
    }

    pub(crate) fn key(self) -> EntityKey {
        self.key
    }

    /// World this entity was created in
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Slot index inside the world
    pub fn index(&self) -> u32 {
        // KeyData packs (version << 32) | index
        (slotmap::Key::data(&self.key).as_ffi() & 0xFFFF_FFFF) as u32
    }

    /// Generation of the slot; bumps every time the slot is reused
    pub fn generation(&self) -> u32 {
        (slotmap::Key::data(&self.key).as_ffi() >> 32) as u32
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}@{}", self.index(), self.generation(), self.world)
    }
}
