//! Content subsystem
//!
//! Owns the material asset kind used by mesh renderers.

use crate::assets::{Asset, AssetError, AssetServer, TypedLoader};
use crate::ecs::components::MeshRendererComponent;
use crate::ecs::{Entity, World};
use crate::subsystem::{Subsystem, SubsystemContext, SubsystemError};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Extension of material files
pub const MATERIAL_EXTENSION: &str = "material";

/// Texture identities referenced by a material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialTexturePaths {
    /// Base color (albedo) texture
    pub base_color: Option<String>,
    /// Normal map
    pub normal: Option<String>,
    /// Emission texture
    pub emission: Option<String>,
    /// Metallic-roughness texture
    pub metallic_roughness: Option<String>,
    /// Ambient occlusion texture
    pub ambient_occlusion: Option<String>,
}

/// PBR material description, stored as RON
///
/// ```ron
/// (
///     name: "wood",
///     base_color: (0.6, 0.4, 0.2, 1.0),
///     roughness: 0.8,
///     textures: (base_color: Some("textures/wood.png")),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialAsset {
    /// Material name
    pub name: String,
    /// Linear RGBA base color
    pub base_color: [f32; 4],
    /// Metalness factor
    pub metallic: f32,
    /// Roughness factor
    pub roughness: f32,
    /// Emitted linear RGB
    pub emission: [f32; 3],
    /// Texture identities
    pub textures: MaterialTexturePaths,
}

impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emission: [0.0, 0.0, 0.0],
            textures: MaterialTexturePaths::default(),
        }
    }
}

impl Asset for MaterialAsset {
    const KIND: &'static str = "material";

    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AssetError::InvalidData(format!("material is not UTF-8: {}", e)))?;
        ron::from_str(text).map_err(|e| AssetError::InvalidData(format!("material: {}", e)))
    }
}

/// Resolve every material referenced by mesh renderers in `ecs`
///
/// Returns the failures; resolved materials stay cached in `assets`.
pub fn resolve_materials(ecs: &World, assets: &AssetServer) -> Vec<(Entity, AssetError)> {
    let mut failures = Vec::new();
    for (entity, renderer) in ecs.query::<MeshRendererComponent>() {
        for material in &renderer.materials {
            if let Err(err) = material.resolve(assets) {
                log::warn!("Material {} of {} unavailable: {}", material.id(), entity, err);
                failures.push((entity, err));
            }
        }
    }
    failures
}

/// Registers content asset kinds
#[derive(Debug, Default)]
pub struct ContentSubsystem;

impl ContentSubsystem {
    /// Create the subsystem
    pub fn new() -> Self {
        Self
    }
}

impl Subsystem for ContentSubsystem {
    fn name(&self) -> &str {
        "content"
    }

    fn initialize(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError> {
        context
            .assets
            .register_loader(TypedLoader::<MaterialAsset>::new(&[MATERIAL_EXTENSION]));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
