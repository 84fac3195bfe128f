//! ECS Components module
//!
//! Engine-provided components. Each one registers a stable wire tag with the
//! world serializer through [`ComponentRegistry::with_builtin`].
//!
//! [`ComponentRegistry::with_builtin`]: crate::serialization::ComponentRegistry::with_builtin

pub mod transform;
pub mod hierarchy;
pub mod audio;
pub mod ui;
pub mod render;
pub mod physics;

pub use transform::TransformComponent;
pub use hierarchy::{NameComponent, ParentComponent};
pub use audio::SoundComponent;
pub use ui::UserInterfaceComponent;
pub use render::MeshRendererComponent;
pub use physics::RigidBodyComponent;
