//! World lifecycle events
//!
//! Published by [`World`](crate::ecs::World) itself: creation once the world
//! is fully usable, destruction before its storage is released.

use super::Event;
use crate::ecs::{ModuleState, WorldId};

/// A world finished construction and is ready for use
#[derive(Debug, Clone)]
pub struct WorldWasCreated {
    /// Identity of the new world
    pub world: WorldId,
    /// Per-subsystem state restored with the world (empty for fresh worlds)
    pub module_state: ModuleState,
}

impl Event for WorldWasCreated {}

/// A world is about to release its entities and components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldWasDestroyed {
    /// Identity of the world being torn down
    pub world: WorldId,
}

impl Event for WorldWasDestroyed {}
