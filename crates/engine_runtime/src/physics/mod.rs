//! Physics subsystem
//!
//! Keeps one [`PhysicsWorld`] per announced ECS world. The physics world
//! knows the ECS world only by identity; the ECS world knows nothing about
//! physics. Gravity persists through the world's `"physics"` module state.

use crate::config::PhysicsConfig;
use crate::ecs::components::{RigidBodyComponent, TransformComponent};
use crate::ecs::{Entity, ModuleState, World, WorldId};
use crate::events::{Subscription, WorldWasCreated, WorldWasDestroyed};
use crate::foundation::math::Vec3;
use crate::serialization::{SerializationError, WireField, WireReader, WireWriter};
use crate::subsystem::{PerWorldState, PhysicsQueries, Subsystem, SubsystemContext, SubsystemError};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// Module-state key of the physics blob
pub const PHYSICS_STATE_KEY: &str = "physics";

/// Physics state parallel to one ECS world
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsWorld {
    /// ECS world this state belongs to
    pub world: WorldId,
    /// Acceleration applied to dynamic bodies
    pub gravity: Vec3,
    /// Body updates performed so far
    pub bodies_stepped: u64,
    /// Seconds simulated so far
    pub simulated_time: f64,
}

impl PhysicsWorld {
    /// Create state for `world`
    pub fn new(world: WorldId, gravity: Vec3) -> Self {
        Self {
            world,
            gravity,
            bodies_stepped: 0,
            simulated_time: 0.0,
        }
    }

    /// Advance every rigid body in `ecs` by `delta_time` seconds
    ///
    /// Semi-implicit Euler: dynamic bodies gain `gravity * dt` velocity, then
    /// every body with a transform moves by its velocity. Returns the number
    /// of bodies updated; a mismatched world updates nothing.
    pub fn step(&mut self, ecs: &mut World, delta_time: f32) -> usize {
        if ecs.id() != self.world {
            log::warn!("Physics state for {} asked to step {}", self.world, ecs.id());
            return 0;
        }

        let bodies: Vec<Entity> = ecs
            .query::<RigidBodyComponent>()
            .into_iter()
            .map(|(entity, _)| entity)
            .collect();

        let mut stepped = 0;
        for entity in bodies {
            let Ok(Some(body)) = ecs.get_component_mut::<RigidBodyComponent>(entity) else {
                continue;
            };
            if !body.kinematic {
                body.velocity += self.gravity * delta_time;
            }
            let displacement = body.velocity * delta_time;

            if let Ok(Some(transform)) = ecs.get_component_mut::<TransformComponent>(entity) {
                transform.translate(displacement);
            }
            stepped += 1;
        }

        self.bodies_stepped += stepped as u64;
        self.simulated_time += f64::from(delta_time);
        stepped
    }

    fn encode_state(&self) -> Result<Vec<u8>, SerializationError> {
        let mut writer = WireWriter::new();
        self.gravity.write(&mut writer)?;
        Ok(writer.into_bytes())
    }

    fn decode_gravity(bytes: &[u8]) -> Result<Vec3, SerializationError> {
        let mut reader = WireReader::new(bytes);
        let gravity = Vec3::read(&mut reader)?;
        if reader.remaining() > 0 {
            return Err(SerializationError::TrailingBytes {
                offset: reader.offset(),
                count: reader.remaining(),
            });
        }
        Ok(gravity)
    }
}

/// Creates and releases physics worlds as ECS worlds come and go
#[derive(Debug)]
pub struct PhysicsSubsystem {
    default_gravity: Vec3,
    worlds: PerWorldState<PhysicsWorld>,
    subscriptions: Vec<Subscription>,
}

impl PhysicsSubsystem {
    /// Create the subsystem with configured defaults
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            default_gravity: config.default_gravity,
            worlds: PerWorldState::new(),
            subscriptions: Vec::new(),
        }
    }

    /// Number of physics worlds alive
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    fn create_world(worlds: &PerWorldState<PhysicsWorld>, default_gravity: Vec3, world: WorldId, state: &ModuleState) {
        let gravity = match state.get(PHYSICS_STATE_KEY) {
            None => default_gravity,
            Some(bytes) => PhysicsWorld::decode_gravity(bytes).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable physics state of {}: {}", world, err);
                default_gravity
            }),
        };
        worlds.insert(world, PhysicsWorld::new(world, gravity));
        log::debug!("Created physics world for {} (gravity {:?})", world, gravity);
    }
}

impl Default for PhysicsSubsystem {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default())
    }
}

impl Subsystem for PhysicsSubsystem {
    fn name(&self) -> &str {
        PHYSICS_STATE_KEY
    }

    fn initialize(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError> {
        for (world, state) in &context.live_worlds {
            Self::create_world(&self.worlds, self.default_gravity, *world, state);
        }

        let worlds = self.worlds.clone();
        let default_gravity = self.default_gravity;
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasCreated| {
            Self::create_world(&worlds, default_gravity, event.world, &event.module_state);
            Ok(())
        }));

        let worlds = self.worlds.clone();
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasDestroyed| {
            if worlds.remove(event.world).is_some() {
                log::debug!("Released physics world for {}", event.world);
            }
            Ok(())
        }));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.subscriptions.clear();
        self.worlds.clear();
    }

    fn export_world_state(&self, world: WorldId) -> Option<Vec<u8>> {
        let state = self.worlds.get(world)?;
        let encoded = state.lock().encode_state();
        encoded
            .map_err(|err| log::error!("Failed to export physics state of {}: {}", world, err))
            .ok()
    }

    fn as_physics(&self) -> Option<&dyn PhysicsQueries> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PhysicsQueries for PhysicsSubsystem {
    fn physics_world(&self, world: WorldId) -> Option<Arc<Mutex<PhysicsWorld>>> {
        self.worlds.get(world)
    }
}
