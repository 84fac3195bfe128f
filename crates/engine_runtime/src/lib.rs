//! # Engine Runtime
//!
//! The runtime core of the engine: ECS worlds, the subsystems that follow
//! their lifecycle, asset references, and world save/load.
//!
//! ## Features
//!
//! - **ECS Worlds**: Generational entities with type-erased component storage
//! - **Event Bus**: Typed, synchronous publish/subscribe for lifecycle events
//! - **Subsystems**: Physics, audio, UI and content modules keyed by world
//! - **Asset References**: Identity-based handles resolved through a shared cache
//! - **World Serialization**: Deterministic binary save/load with asset identities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engine_runtime::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = Runtime::with_default_subsystems(RuntimeConfig::default())?;
//!     runtime.initialize()?;
//!
//!     let mut world = runtime.create_world()?;
//!     let player = world.create_entity();
//!     world.add_component(player, SoundComponent::new("music/theme.ogg"))?;
//!
//!     let bytes = runtime.save_world(&mut world)?;
//!     let restored = runtime.load_world(&bytes)?;
//!     assert_eq!(restored.entity_count(), 1);
//!
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod events;
pub mod assets;
pub mod ecs;
pub mod subsystem;
pub mod physics;
pub mod audio;
pub mod ui;
pub mod content;
pub mod serialization;

mod runtime;

pub use runtime::{Runtime, RuntimeError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Runtime, RuntimeError,
        config::{Config, RuntimeConfig, AssetConfig, SerializationConfig, PhysicsConfig, LoggingConfig},
        foundation::{
            logging::Logger,
            math::{Vec3, Quat},
        },
        events::{EventBus, Subscription, WorldWasCreated, WorldWasDestroyed},
        assets::{Asset, AssetId, AssetReference, AssetServer, AssetError},
        ecs::{World, WorldId, Entity, Component, EcsError},
        ecs::components::{
            TransformComponent, NameComponent, ParentComponent,
            SoundComponent, UserInterfaceComponent, MeshRendererComponent, RigidBodyComponent,
        },
        subsystem::{Subsystem, SubsystemContext, SubsystemRegistry, PhysicsQueries, LoggerFactory},
        physics::{PhysicsSubsystem, PhysicsWorld},
        audio::{AudioSubsystem, SoundClip},
        ui::{UiSubsystem, UserInterfaceAsset},
        content::{ContentSubsystem, MaterialAsset},
        serialization::{WorldSerializer, SerializerOptions, ComponentRegistry, SerializationError},
    };
}
