//! World serialization
//!
//! Binary save/load of a world's entities, components and module state.
//!
//! Layout (version 1, all integers little-endian):
//!
//! ```text
//! header   : magic "EWLD" | u16 version | u32 entity_count
//! entity   : u32 local_id | u32 component_count | component*
//! component: str tag | u32 payload_len | payload
//! modules  : u32 module_count | (str name | u32 len | bytes)*
//! str      : u32 byte_len | UTF-8 bytes
//! ```
//!
//! Entities are written in creation order and their local ids are their
//! position in that order, so entity fields can be re-linked on load.
//! Component records within an entity are sorted by tag. Saving an unchanged
//! world twice yields identical bytes.

mod error;
mod registry;
mod wire;

pub use error::SerializationError;
pub use registry::{ComponentCodec, ComponentRegistry, SerializableComponent};
pub use wire::{LengthMark, WireField, WireReader, WireWriter};

use crate::config::SerializationConfig;
use crate::ecs::{Entity, World};
use std::collections::{HashMap, HashSet};

/// Leading bytes of every serialized world
pub const MAGIC: [u8; 4] = *b"EWLD";

/// Format version written and accepted by this build
pub const FORMAT_VERSION: u16 = 1;

// local_id + component_count
const MIN_ENTITY_RECORD: usize = 8;

/// Decoding policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Skip component records with unregistered tags instead of failing
    pub skip_unknown_components: bool,
}

impl From<&SerializationConfig> for SerializerOptions {
    fn from(config: &SerializationConfig) -> Self {
        Self {
            skip_unknown_components: config.skip_unknown_components,
        }
    }
}

/// Converts worlds to and from bytes
#[derive(Debug)]
pub struct WorldSerializer {
    registry: ComponentRegistry,
    options: SerializerOptions,
}

impl WorldSerializer {
    /// Create a serializer over `registry` with strict decoding
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            options: SerializerOptions::default(),
        }
    }

    /// Replace the decoding policy
    #[must_use]
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Codec table in use
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Codec table, for registering game components
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Decoding policy in use
    pub fn options(&self) -> SerializerOptions {
        self.options
    }

    /// Append the encoding of `world` to `out`
    ///
    /// Fails without touching `out` if any component type has no codec or an
    /// entity field points outside the world.
    pub fn serialize(&self, world: &World, out: &mut Vec<u8>) -> Result<(), SerializationError> {
        let entities: Vec<Entity> = world.entities().collect();
        let mut ordinals = HashMap::with_capacity(entities.len());
        for (ordinal, &entity) in entities.iter().enumerate() {
            let ordinal =
                u32::try_from(ordinal).map_err(|_| SerializationError::TooLarge { len: ordinal })?;
            ordinals.insert(entity, ordinal);
        }

        let mut writer = WireWriter::with_entities(ordinals);
        writer.write_raw(&MAGIC);
        writer.write_u16(FORMAT_VERSION);
        writer.write_len(entities.len())?;

        let mut component_total = 0usize;
        for (local_id, &entity) in (0u32..).zip(entities.iter()) {
            let mut codecs = Vec::new();
            for (type_id, type_name) in world.component_types(entity)? {
                let codec = self
                    .registry
                    .codec_for_type(type_id)
                    .ok_or(SerializationError::UnregisteredComponent { type_name })?;
                codecs.push(codec);
            }
            codecs.sort_by_key(|codec| codec.tag());
            component_total += codecs.len();

            writer.write_u32(local_id);
            writer.write_len(codecs.len())?;
            for codec in codecs {
                writer.write_str(codec.tag())?;
                let mark = writer.begin_length();
                codec
                    .encode(world, entity, &mut writer)
                    .map_err(|err| err.in_component(local_id, codec.tag()))?;
                writer.end_length(mark)?;
            }
        }

        let module_state = world.module_state();
        writer.write_len(module_state.len())?;
        for (name, bytes) in module_state.iter() {
            writer.write_str(name)?;
            writer.write_bytes(bytes)?;
        }

        let bytes = writer.into_bytes();
        log::debug!(
            "Serialized {}: {} entities, {} components, {} module blobs, {} bytes",
            world.id(),
            entities.len(),
            component_total,
            module_state.len(),
            bytes.len()
        );
        out.extend_from_slice(&bytes);
        Ok(())
    }

    /// Encode `world` into a fresh buffer
    pub fn to_bytes(&self, world: &World) -> Result<Vec<u8>, SerializationError> {
        let mut out = Vec::new();
        self.serialize(world, &mut out)?;
        Ok(out)
    }

    /// Rebuild a world from `bytes`
    ///
    /// The returned world is detached; nothing is announced and no asset is
    /// loaded. On error no partial world escapes.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<World, SerializationError> {
        let result = self.decode(bytes);
        if let Err(err) = &result {
            log::error!("Failed to load world: {err}");
        }
        result
    }

    fn decode(&self, bytes: &[u8]) -> Result<World, SerializationError> {
        let mut header = WireReader::new(bytes);
        if header.remaining() < MAGIC.len() {
            let mut found = [0u8; 4];
            found[..bytes.len()].copy_from_slice(bytes);
            return Err(SerializationError::BadMagic { found });
        }
        let mut found = [0u8; 4];
        found.copy_from_slice(header.read_raw(MAGIC.len())?);
        if found != MAGIC {
            return Err(SerializationError::BadMagic { found });
        }

        let version = header.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let count_offset = header.offset();
        let entity_count = header.read_len()?;
        // Reject absurd counts before allocating anything
        if entity_count > header.remaining() / MIN_ENTITY_RECORD {
            return Err(SerializationError::UnexpectedEof {
                offset: count_offset,
                needed: entity_count.saturating_mul(MIN_ENTITY_RECORD),
                remaining: header.remaining(),
            });
        }

        let mut world = World::new();
        let entities: Vec<Entity> = (0..entity_count).map(|_| world.create_entity()).collect();
        let mut reader = WireReader::with_entities(bytes, &entities);
        reader.skip(header.offset())?;

        let mut seen_ids = vec![false; entity_count];
        for record in 0..entity_count {
            let record_offset = reader.offset();
            let local_id = reader.read_u32()?;
            let entity = match seen_ids.get_mut(local_id as usize) {
                Some(seen) if !*seen => {
                    *seen = true;
                    entities[local_id as usize]
                }
                _ => {
                    return Err(SerializationError::InvalidEntityId {
                        record,
                        local_id,
                        offset: record_offset,
                    })
                }
            };
            self.decode_components(&mut reader, &mut world, entity, local_id)?;
        }

        let module_count = reader.read_len()?;
        for _ in 0..module_count {
            let name = reader.read_str()?.to_owned();
            let blob = reader.read_bytes()?.to_vec();
            world.module_state_mut().insert(name, blob);
        }

        if reader.remaining() > 0 {
            return Err(SerializationError::TrailingBytes {
                offset: reader.offset(),
                count: reader.remaining(),
            });
        }

        log::debug!(
            "Deserialized {} with {} entities and {} module blobs",
            world.id(),
            entity_count,
            module_count
        );
        Ok(world)
    }

    fn decode_components(
        &self,
        reader: &mut WireReader<'_>,
        world: &mut World,
        entity: Entity,
        local_id: u32,
    ) -> Result<(), SerializationError> {
        let component_count = reader.read_len()?;
        let mut seen_tags = HashSet::with_capacity(component_count.min(reader.remaining()));

        for _ in 0..component_count {
            let record_offset = reader.offset();
            let tag = reader.read_str()?;
            let payload_len = reader.read_len()?;
            let mut payload = reader.sub_reader(payload_len)?;

            let Some(codec) = self.registry.codec_for_tag(tag) else {
                if self.options.skip_unknown_components {
                    log::warn!(
                        "Skipping unknown component '{tag}' ({payload_len} bytes) on entity {local_id}"
                    );
                    continue;
                }
                return Err(SerializationError::UnknownComponent {
                    tag: tag.to_string(),
                    entity: local_id,
                    offset: record_offset,
                });
            };

            if !seen_tags.insert(tag) {
                return Err(SerializationError::DuplicateComponent {
                    tag: tag.to_string(),
                    entity: local_id,
                    offset: record_offset,
                });
            }

            codec
                .decode(&mut payload, world, entity)
                .map_err(|err| err.in_component(local_id, tag))?;
            if payload.remaining() > 0 {
                return Err(SerializationError::LengthMismatch {
                    tag: tag.to_string(),
                    entity: local_id,
                    declared: payload_len,
                    consumed: payload_len - payload.remaining(),
                });
            }
        }
        Ok(())
    }
}

impl Default for WorldSerializer {
    fn default() -> Self {
        Self::new(ComponentRegistry::with_builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{
        MeshRendererComponent, NameComponent, ParentComponent, SoundComponent, TransformComponent,
    };
    use crate::ecs::Component;
    use crate::foundation::math::Vec3;

    #[derive(Debug)]
    struct Unsaved;
    impl Component for Unsaved {}

    fn sample_world() -> (World, Entity, Entity) {
        let mut world = World::new();
        let root = world.create_entity();
        world.add_component(root, NameComponent::new("root")).unwrap();
        world
            .add_component(root, TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let child = world.create_entity();
        world.add_component(child, ParentComponent::new(root)).unwrap();
        world
            .add_component(child, SoundComponent::new("music/theme.ogg").playing())
            .unwrap();
        world
            .add_component(
                child,
                MeshRendererComponent::new("meshes/crate.obj", "materials/wood.material"),
            )
            .unwrap();
        world.module_state_mut().insert("physics", vec![1, 2, 3]);
        (world, root, child)
    }

    #[test]
    fn test_header_layout() {
        let bytes = WorldSerializer::default().to_bytes(&World::new()).unwrap();
        assert_eq!(&bytes[..4], b"EWLD");
        assert_eq!(&bytes[4..6], &1u16.to_le_bytes());
        // no entities, no modules
        assert_eq!(&bytes[6..], &[0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_round_trip_relinks_entities() {
        let (world, _, _) = sample_world();
        let serializer = WorldSerializer::default();
        let bytes = serializer.to_bytes(&world).unwrap();
        let loaded = serializer.deserialize(&bytes).unwrap();

        let order: Vec<Entity> = loaded.entities().collect();
        assert_eq!(order.len(), 2);
        let (root, child) = (order[0], order[1]);
        assert_eq!(loaded.get_component::<NameComponent>(root).unwrap().unwrap().name, "root");
        assert_eq!(
            loaded.get_component::<ParentComponent>(child).unwrap(),
            Some(&ParentComponent::new(root))
        );
        let sound = loaded.get_component::<SoundComponent>(child).unwrap().unwrap();
        assert_eq!(sound.sound.id().as_str(), "music/theme.ogg");
        assert!(!sound.sound.is_resolved());
        assert_eq!(loaded.module_state().get("physics"), Some(&[1u8, 2, 3][..]));
        assert!(!loaded.is_announced());

        assert_eq!(serializer.to_bytes(&loaded).unwrap(), bytes);
    }

    #[test]
    fn test_unregistered_component_fails_serialize() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Unsaved).unwrap();

        let mut out = Vec::new();
        let result = WorldSerializer::default().serialize(&world, &mut out);
        assert!(matches!(result, Err(SerializationError::UnregisteredComponent { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_dangling_parent_fails_serialize() {
        let mut world = World::new();
        let parent = world.create_entity();
        let child = world.create_entity();
        world.add_component(child, ParentComponent::new(parent)).unwrap();
        world.destroy_entity(parent).unwrap();

        let result = WorldSerializer::default().to_bytes(&world);
        match result {
            Err(SerializationError::Component { entity, tag, source }) => {
                assert_eq!(entity, 0);
                assert_eq!(tag, "core.parent");
                assert!(matches!(*source, SerializationError::DanglingEntity { .. }));
            }
            other => panic!("expected dangling entity, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_header_is_rejected() {
        let serializer = WorldSerializer::default();
        assert_eq!(
            serializer.deserialize(b"EW").unwrap_err(),
            SerializationError::BadMagic { found: [b'E', b'W', 0, 0] }
        );

        let mut bytes = serializer.to_bytes(&World::new()).unwrap();
        bytes[4] = 2;
        assert_eq!(
            serializer.deserialize(&bytes).unwrap_err(),
            SerializationError::UnsupportedVersion { found: 2, expected: 1 }
        );
    }

    #[test]
    fn test_huge_entity_count_is_rejected_before_allocation() {
        let mut bytes = Vec::from(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            WorldSerializer::default().deserialize(&bytes),
            Err(SerializationError::UnexpectedEof { offset: 6, .. })
        ));
    }

    #[test]
    fn test_every_truncation_fails() {
        let (world, _, _) = sample_world();
        let serializer = WorldSerializer::default();
        let bytes = serializer.to_bytes(&world).unwrap();

        for len in 0..bytes.len() {
            assert!(
                serializer.deserialize(&bytes[..len]).is_err(),
                "truncation to {len} bytes decoded"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let serializer = WorldSerializer::default();
        let mut bytes = serializer.to_bytes(&World::new()).unwrap();
        let end = bytes.len();
        bytes.push(0xAA);
        assert_eq!(
            serializer.deserialize(&bytes).unwrap_err(),
            SerializationError::TrailingBytes { offset: end, count: 1 }
        );
    }

    #[test]
    fn test_repeated_local_id_is_rejected() {
        let mut world = World::new();
        world.create_entity();
        world.create_entity();
        let serializer = WorldSerializer::default();
        let mut bytes = serializer.to_bytes(&world).unwrap();

        // second record starts after header (10) and first record (8)
        bytes[18..22].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            serializer.deserialize(&bytes).unwrap_err(),
            SerializationError::InvalidEntityId { record: 1, local_id: 0, offset: 18 }
        );
    }
}
