//! Pluggable engine subsystems
//!
//! A subsystem follows world lifecycle through the event bus and keeps its
//! own state per [`WorldId`]. Specialised queries are exposed through small
//! capability traits ([`PhysicsQueries`], [`LoggerFactory`]) instead of one
//! interface covering every module.

pub mod logging;
pub mod world_state;

pub use logging::LoggingSubsystem;
pub use world_state::PerWorldState;

use crate::assets::AssetServer;
use crate::ecs::{ModuleState, WorldId};
use crate::events::EventBus;
use crate::foundation::logging::Logger;
use crate::physics::PhysicsWorld;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Subsystem errors
#[derive(Error, Debug)]
pub enum SubsystemError {
    /// A subsystem with this name is already registered
    #[error("subsystem '{0}' is already registered")]
    Duplicate(String),

    /// A subsystem failed to start
    #[error("subsystem '{name}' failed to initialize: {reason}")]
    InitializationFailed {
        /// Subsystem name
        name: String,
        /// What went wrong
        reason: String,
    },
}

/// Shared services handed to subsystems during initialization
#[derive(Debug, Clone)]
pub struct SubsystemContext {
    /// Bus carrying world lifecycle events
    pub events: Arc<EventBus>,
    /// Shared asset cache
    pub assets: Arc<AssetServer>,
    /// Worlds that were announced before this initialization, with their state
    pub live_worlds: Vec<(WorldId, ModuleState)>,
}

/// An engine module reacting to world lifecycle
pub trait Subsystem: Any + Send {
    /// Unique name; also the module-state key the subsystem persists under
    fn name(&self) -> &str;

    /// Subscribe to events and register loaders
    ///
    /// Subsystems registered after worlds already exist must build their
    /// state for every entry in [`SubsystemContext::live_worlds`].
    fn initialize(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError>;

    /// Release subscriptions and per-world state
    fn shutdown(&mut self) {}

    /// State to persist with `world` when it is saved
    fn export_world_state(&self, _world: WorldId) -> Option<Vec<u8>> {
        None
    }

    /// Physics capability
    fn as_physics(&self) -> Option<&dyn PhysicsQueries> {
        None
    }

    /// Logger factory capability
    fn as_logging(&self) -> Option<&dyn LoggerFactory> {
        None
    }

    /// Concrete type access for [`SubsystemRegistry::get`]
    fn as_any(&self) -> &dyn Any;
}

/// Physics queries exposed to gameplay code
pub trait PhysicsQueries {
    /// Physics state of `world`, absent if the world was never announced to physics
    fn physics_world(&self, world: WorldId) -> Option<Arc<Mutex<PhysicsWorld>>>;
}

/// Creates category loggers
pub trait LoggerFactory {
    /// Logger reporting under `category`
    fn create_logger(&self, category: &str) -> Logger;
}

struct Entry {
    subsystem: Box<dyn Subsystem>,
    initialized: bool,
}

/// Ordered collection of subsystems
///
/// Subsystems are initialized in registration order and shut down in
/// reverse.
#[derive(Default)]
pub struct SubsystemRegistry {
    entries: Vec<Entry>,
}

impl SubsystemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subsystem
    pub fn register(&mut self, subsystem: Box<dyn Subsystem>) -> Result<(), SubsystemError> {
        let name = subsystem.name();
        if self.entries.iter().any(|entry| entry.subsystem.name() == name) {
            return Err(SubsystemError::Duplicate(name.to_string()));
        }
        log::debug!("Registered subsystem '{}'", name);
        self.entries.push(Entry {
            subsystem,
            initialized: false,
        });
        Ok(())
    }

    /// Initialize every subsystem that is not running yet
    ///
    /// Stops at the first failure; subsystems before it stay initialized.
    pub fn initialize_all(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError> {
        for entry in self.entries.iter_mut().filter(|entry| !entry.initialized) {
            entry.subsystem.initialize(context)?;
            entry.initialized = true;
            log::info!("Subsystem '{}' initialized", entry.subsystem.name());
        }
        Ok(())
    }

    /// Shut down running subsystems in reverse registration order
    pub fn shutdown_all(&mut self) {
        for entry in self.entries.iter_mut().rev().filter(|entry| entry.initialized) {
            entry.subsystem.shutdown();
            entry.initialized = false;
            log::info!("Subsystem '{}' shut down", entry.subsystem.name());
        }
    }

    /// Subsystem of concrete type `S`
    pub fn get<S: Subsystem>(&self) -> Option<&S> {
        self.entries
            .iter()
            .find_map(|entry| entry.subsystem.as_any().downcast_ref::<S>())
    }

    /// First subsystem providing physics queries
    pub fn physics(&self) -> Option<&dyn PhysicsQueries> {
        self.entries.iter().find_map(|entry| entry.subsystem.as_physics())
    }

    /// First subsystem providing loggers
    pub fn logging(&self) -> Option<&dyn LoggerFactory> {
        self.entries.iter().find_map(|entry| entry.subsystem.as_logging())
    }

    /// Module state each subsystem wants saved with `world`
    pub fn export_world_state(&self, world: WorldId) -> Vec<(String, Vec<u8>)> {
        self.entries
            .iter()
            .filter(|entry| entry.initialized)
            .filter_map(|entry| {
                entry
                    .subsystem
                    .export_world_state(world)
                    .map(|bytes| (entry.subsystem.name().to_string(), bytes))
            })
            .collect()
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.subsystem.name()).collect()
    }

    /// Whether the named subsystem is running
    pub fn is_initialized(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.initialized && entry.subsystem.name() == name)
    }

    /// Number of registered subsystems
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SubsystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
