//! Mesh renderer component

use crate::assets::{AssetId, AssetReference};
use crate::content::MaterialAsset;
use crate::ecs::Component;

/// Renders a mesh with one material per submesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRendererComponent {
    /// Mesh identity, owned by the renderer
    pub mesh: AssetId,
    /// Materials, indexed by submesh
    pub materials: Vec<AssetReference<MaterialAsset>>,
    /// Whether the mesh casts shadows
    pub cast_shadows: bool,
}

impl MeshRendererComponent {
    /// Create a renderer with a single material
    pub fn new(mesh: impl Into<AssetId>, material: impl Into<AssetId>) -> Self {
        Self {
            mesh: mesh.into(),
            materials: vec![AssetReference::new(material)],
            cast_shadows: true,
        }
    }

    /// Append a material for the next submesh
    pub fn with_material(mut self, material: impl Into<AssetId>) -> Self {
        self.materials.push(AssetReference::new(material));
        self
    }
}

impl Component for MeshRendererComponent {}

crate::impl_serializable_component!(MeshRendererComponent, "render.mesh_renderer", {
    mesh,
    materials,
    cast_shadows,
});
