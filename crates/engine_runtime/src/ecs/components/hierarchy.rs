//! Naming and parenting components

use crate::ecs::{Component, Entity};

/// Human-readable entity name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameComponent {
    /// Display name
    pub name: String,
}

impl NameComponent {
    /// Create a name component
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for NameComponent {}

crate::impl_serializable_component!(NameComponent, "core.name", { name });

/// Link from a child entity to its parent in the same world
///
/// Saved as the parent's position in the world's creation order and
/// re-linked to the recreated parent on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentComponent {
    /// Parent entity
    pub parent: Entity,
}

impl ParentComponent {
    /// Create a parent link
    pub fn new(parent: Entity) -> Self {
        Self { parent }
    }
}

impl Component for ParentComponent {}

crate::impl_serializable_component!(ParentComponent, "core.parent", { parent });
