//! Rigid body component

use crate::ecs::Component;
use crate::foundation::math::Vec3;

/// Body simulated by the physics subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyComponent {
    /// Mass in kilograms
    pub mass: f32,
    /// Linear velocity in metres per second
    pub velocity: Vec3,
    /// Kinematic bodies are moved by gameplay code, not by gravity
    pub kinematic: bool,
    /// Collision layer bit mask
    pub collision_layers: u32,
}

impl Default for RigidBodyComponent {
    fn default() -> Self {
        Self {
            mass: 1.0,
            velocity: Vec3::zeros(),
            kinematic: false,
            collision_layers: 1,
        }
    }
}

impl RigidBodyComponent {
    /// Dynamic body with the given mass
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            ..Default::default()
        }
    }

    /// Kinematic body
    pub fn kinematic() -> Self {
        Self {
            kinematic: true,
            ..Default::default()
        }
    }
}

impl Component for RigidBodyComponent {}

crate::impl_serializable_component!(RigidBodyComponent, "physics.rigid_body", {
    mass,
    velocity,
    kinematic,
    collision_layers,
});
