//! Core runtime implementation

use crate::assets::{self, AssetError, AssetServer};
use crate::audio::AudioSubsystem;
use crate::config::{ConfigError, RuntimeConfig};
use crate::content::ContentSubsystem;
use crate::ecs::{EcsError, ModuleState, World, WorldId};
use crate::events::{EventBus, Subscription, WorldWasCreated, WorldWasDestroyed};
use crate::foundation::logging::Logger;
use crate::physics::{PhysicsSubsystem, PhysicsWorld};
use crate::serialization::{ComponentRegistry, SerializableComponent, SerializationError, WorldSerializer};
use crate::subsystem::{LoggingSubsystem, Subsystem, SubsystemContext, SubsystemError, SubsystemRegistry};
use crate::ui::UiSubsystem;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Runtime errors
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Worlds were requested before [`Runtime::initialize`]
    #[error("runtime is not initialized")]
    NotInitialized,

    /// Subsystem error
    #[error("Subsystem error: {0}")]
    Subsystem(#[from] SubsystemError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// World error
    #[error("World error: {0}")]
    World(#[from] EcsError),

    /// Asset error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

type LiveWorlds = Arc<Mutex<BTreeMap<WorldId, ModuleState>>>;

/// Main runtime struct
///
/// Owns the event bus, the asset cache, the subsystems and the world
/// serializer. Worlds it creates belong to the caller; the runtime only
/// tracks which ones are alive so late subsystems can catch up.
pub struct Runtime {
    config: RuntimeConfig,
    events: Arc<EventBus>,
    assets: Arc<AssetServer>,
    subsystems: SubsystemRegistry,
    serializer: WorldSerializer,
    live_worlds: LiveWorlds,
    _tracking: [Subscription; 2],
    running: bool,
}

impl Runtime {
    /// Create a runtime with no subsystems
    pub fn new(config: RuntimeConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let assets = Arc::new(AssetServer::from_config(&config.assets));
        let serializer = WorldSerializer::new(ComponentRegistry::with_builtin())
            .with_options((&config.serialization).into());

        let live_worlds: LiveWorlds = Arc::default();
        let created = {
            let live_worlds = Arc::clone(&live_worlds);
            events.subscribe(move |event: &WorldWasCreated| {
                live_worlds.lock().insert(event.world, event.module_state.clone());
                Ok(())
            })
        };
        let destroyed = {
            let live_worlds = Arc::clone(&live_worlds);
            events.subscribe(move |event: &WorldWasDestroyed| {
                live_worlds.lock().remove(&event.world);
                Ok(())
            })
        };

        Self {
            config,
            events,
            assets,
            subsystems: SubsystemRegistry::new(),
            serializer,
            live_worlds,
            _tracking: [created, destroyed],
            running: false,
        }
    }

    /// Create a runtime with the logging, physics, audio, ui and content subsystems
    pub fn with_default_subsystems(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let mut runtime = Self::new(config);
        let logging = LoggingSubsystem::new(runtime.config.logging.clone());
        let physics = PhysicsSubsystem::new(&runtime.config.physics);
        runtime.register_subsystem(Box::new(logging))?;
        runtime.register_subsystem(Box::new(physics))?;
        runtime.register_subsystem(Box::new(AudioSubsystem::new()))?;
        runtime.register_subsystem(Box::new(UiSubsystem::new()))?;
        runtime.register_subsystem(Box::new(ContentSubsystem::new()))?;
        Ok(runtime)
    }

    /// Add a subsystem
    ///
    /// A runtime that is already running initializes it immediately, handing
    /// it every live world.
    pub fn register_subsystem(&mut self, subsystem: Box<dyn Subsystem>) -> Result<(), RuntimeError> {
        self.subsystems.register(subsystem)?;
        if self.running {
            let context = self.context();
            self.subsystems.initialize_all(&context)?;
        }
        Ok(())
    }

    /// Register a component type with the world serializer
    pub fn register_component<T: SerializableComponent>(&mut self) -> Result<(), RuntimeError> {
        self.serializer.registry_mut().register::<T>()?;
        Ok(())
    }

    /// Initialize every registered subsystem
    pub fn initialize(&mut self) -> Result<(), RuntimeError> {
        log::info!("Initializing runtime...");
        let context = self.context();
        self.subsystems.initialize_all(&context)?;
        self.running = true;
        log::info!(
            "Runtime ready with subsystems {:?}",
            self.subsystems.names()
        );
        Ok(())
    }

    /// Whether [`Runtime::initialize`] has run and [`Runtime::shutdown`] has not
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Create a world and announce it to every subsystem
    ///
    /// Every subsystem has built its state for the world when this returns.
    pub fn create_world(&self) -> Result<World, RuntimeError> {
        if !self.running {
            return Err(RuntimeError::NotInitialized);
        }
        let mut world = World::new();
        self.announce(&mut world)?;
        Ok(world)
    }

    /// Encode `world`, first storing each subsystem's state in its module state
    pub fn save_world(&self, world: &mut World) -> Result<Vec<u8>, RuntimeError> {
        for (module, bytes) in self.subsystems.export_world_state(world.id()) {
            world.module_state_mut().insert(module, bytes);
        }
        Ok(self.serializer.to_bytes(world)?)
    }

    /// Decode a world and announce it once it is complete
    ///
    /// Asset references in the loaded components stay unresolved.
    pub fn load_world(&self, bytes: &[u8]) -> Result<World, RuntimeError> {
        if !self.running {
            return Err(RuntimeError::NotInitialized);
        }
        let mut world = self.serializer.deserialize(bytes)?;
        self.announce(&mut world)?;
        Ok(world)
    }

    /// Physics state of `world`
    pub fn physics_world(&self, world: WorldId) -> Option<Arc<Mutex<PhysicsWorld>>> {
        self.subsystems.physics()?.physics_world(world)
    }

    /// Logger for `category`, from the logging subsystem when one is registered
    pub fn create_logger(&self, category: &str) -> Logger {
        self.subsystems
            .logging()
            .map_or_else(|| Logger::new(category), |factory| factory.create_logger(category))
    }

    /// Worlds announced by this runtime and not yet dropped
    pub fn live_worlds(&self) -> Vec<WorldId> {
        self.live_worlds.lock().keys().copied().collect()
    }

    /// Make this runtime's asset cache the process-wide one
    pub fn install_global_assets(&self) {
        if assets::global::install(Arc::clone(&self.assets)).is_some() {
            log::warn!("Replaced a previously installed global asset server");
        }
    }

    /// Shut down subsystems in reverse order and drop cached assets
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        log::info!("Runtime shutdown requested");
        self.subsystems.shutdown_all();

        let owns_global = assets::global::installed().is_some_and(|global| Arc::ptr_eq(&global, &self.assets));
        if owns_global {
            assets::global::teardown();
        }
        self.assets.clear();
        self.running = false;
        log::info!("Runtime shutdown complete");
    }

    /// Event bus shared with worlds and subsystems
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Shared asset cache
    pub fn assets(&self) -> &Arc<AssetServer> {
        &self.assets
    }

    /// Registered subsystems
    pub fn subsystems(&self) -> &SubsystemRegistry {
        &self.subsystems
    }

    /// World serializer
    pub fn serializer(&self) -> &WorldSerializer {
        &self.serializer
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn announce(&self, world: &mut World) -> Result<(), RuntimeError> {
        let delivery = world.announce(Arc::clone(&self.events))?;
        if !delivery.is_clean() {
            log::warn!(
                "{} of {} subscriber(s) failed while creating {}",
                delivery.failures.len(),
                delivery.delivered,
                world.id()
            );
        }
        Ok(())
    }

    fn context(&self) -> SubsystemContext {
        let live_worlds = self
            .live_worlds
            .lock()
            .iter()
            .map(|(world, state)| (*world, state.clone()))
            .collect();
        SubsystemContext {
            events: Arc::clone(&self.events),
            assets: Arc::clone(&self.assets),
            live_worlds,
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("subsystems", &self.subsystems)
            .field("live_worlds", &self.live_worlds())
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
