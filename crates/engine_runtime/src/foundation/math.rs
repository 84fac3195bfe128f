//! Math utilities and types
//!
//! Provides the fundamental math types shared by components and subsystems.

pub use nalgebra::{
    Vector3,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Standard gravity in metres per second squared (Y-up)
pub fn standard_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81, 0.0)
}
