//! Transform component for the ECS system
//!
//! Pure data component. Y-up right-handed coordinates.

use crate::ecs::Component;
use crate::foundation::math::{Quat, Vec3};

/// ECS Transform component
///
/// Spatial transformation in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// World space position (Y-up right-handed)
    pub position: Vec3,

    /// World space rotation quaternion
    pub rotation: Quat,

    /// World space scale factors
    pub scale: Vec3,
}

impl Component for TransformComponent {}

crate::impl_serializable_component!(TransformComponent, "core.transform", {
    position,
    rotation,
    scale,
});

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create from position, rotation and scale
    pub fn from_transform(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Move by `delta` in world space
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{SerializableComponent, WireReader, WireWriter};
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_transform_identity() {
        let transform = TransformComponent::identity();

        assert_eq!(transform.position, Vec3::zeros());
        assert_relative_eq!(transform.rotation, Quat::identity(), epsilon = EPSILON);
        assert_eq!(transform.scale, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_transform_from_position() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let transform = TransformComponent::from_position(position);

        assert_eq!(transform.position, position);
        assert_relative_eq!(transform.rotation, Quat::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_transform_wire_encoding_preserves_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_3);
        let original = TransformComponent::from_transform(
            Vec3::new(-4.0, 0.5, 12.0),
            rotation,
            Vec3::new(2.0, 2.0, 2.0),
        );

        let mut writer = WireWriter::new();
        original.encode(&mut writer).unwrap();
        // 3 floats + 4 floats + 3 floats
        assert_eq!(writer.len(), 40);

        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes);
        let decoded = TransformComponent::decode(&mut reader).unwrap();

        assert_eq!(decoded.position, original.position);
        assert_eq!(decoded.scale, original.scale);
        assert_relative_eq!(decoded.rotation, original.rotation, epsilon = EPSILON);
        assert_eq!(reader.remaining(), 0);
    }
}
