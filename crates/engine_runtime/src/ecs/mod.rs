//! Entity-Component-System implementation
//!
//! Worlds own generational entities and type-erased component columns, and
//! announce their lifecycle on the [`EventBus`](crate::events::EventBus).

pub mod world;
pub mod entity;
pub mod component;
pub mod module_state;
pub mod components;

pub(crate) mod storage;


pub use world::{World, WorldId, EcsError, InvalidEntityReason};
pub use entity::Entity;
pub use component::Component;
pub use module_state::ModuleState;
