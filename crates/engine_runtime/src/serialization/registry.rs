//! Component codec registry
//!
//! Maps stable type tags to encode/decode function pairs. The registry is
//! filled at startup; nothing is discovered at runtime.

use super::{SerializationError, WireReader, WireWriter};
use crate::ecs::components::{
    MeshRendererComponent, NameComponent, ParentComponent, RigidBodyComponent, SoundComponent,
    TransformComponent, UserInterfaceComponent,
};
use crate::ecs::{Component, Entity, World};
use std::any::{type_name, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A component with a stable wire encoding
///
/// Usually implemented with [`impl_serializable_component!`](crate::impl_serializable_component).
pub trait SerializableComponent: Component + Sized {
    /// Stable tag identifying the component type on the wire
    const TYPE_TAG: &'static str;

    /// Encode the component's fields
    fn encode(&self, writer: &mut WireWriter) -> Result<(), SerializationError>;

    /// Decode the component's fields
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, SerializationError>;
}

/// Implement [`SerializableComponent`] by encoding the listed fields in order
///
/// Every field type must implement [`WireField`](crate::serialization::WireField).
///
/// ```ignore
/// impl_serializable_component!(NameComponent, "core.name", { name });
/// ```
#[macro_export]
macro_rules! impl_serializable_component {
    ($ty:ty, $tag:literal, { $($field:ident),* $(,)? }) => {
        impl $crate::serialization::SerializableComponent for $ty {
            const TYPE_TAG: &'static str = $tag;

            fn encode(
                &self,
                writer: &mut $crate::serialization::WireWriter,
            ) -> ::std::result::Result<(), $crate::serialization::SerializationError> {
                $( $crate::serialization::WireField::write(&self.$field, writer)?; )*
                Ok(())
            }

            fn decode(
                reader: &mut $crate::serialization::WireReader<'_>,
            ) -> ::std::result::Result<Self, $crate::serialization::SerializationError> {
                Ok(Self {
                    $( $field: $crate::serialization::WireField::read(reader)?, )*
                })
            }
        }
    };
}

type EncodeFn = fn(&World, Entity, &mut WireWriter) -> Result<(), SerializationError>;
type DecodeFn = fn(&mut WireReader<'_>, &mut World, Entity) -> Result<(), SerializationError>;

/// Type-erased encode/decode pair for one component type
#[derive(Clone, Copy)]
pub struct ComponentCodec {
    tag: &'static str,
    type_name: &'static str,
    type_id: TypeId,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl ComponentCodec {
    fn of<T: SerializableComponent>() -> Self {
        Self {
            tag: T::TYPE_TAG,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            encode: encode_component::<T>,
            decode: decode_component::<T>,
        }
    }

    /// Wire tag
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Rust type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn encode(
        &self,
        world: &World,
        entity: Entity,
        writer: &mut WireWriter,
    ) -> Result<(), SerializationError> {
        (self.encode)(world, entity, writer)
    }

    pub(crate) fn decode(
        &self,
        reader: &mut WireReader<'_>,
        world: &mut World,
        entity: Entity,
    ) -> Result<(), SerializationError> {
        (self.decode)(reader, world, entity)
    }
}

impl fmt::Debug for ComponentCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCodec")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn encode_component<T: SerializableComponent>(
    world: &World,
    entity: Entity,
    writer: &mut WireWriter,
) -> Result<(), SerializationError> {
    match world.get_component::<T>(entity)? {
        Some(component) => component.encode(writer),
        None => Ok(()),
    }
}

fn decode_component<T: SerializableComponent>(
    reader: &mut WireReader<'_>,
    world: &mut World,
    entity: Entity,
) -> Result<(), SerializationError> {
    let component = T::decode(reader)?;
    world.add_component(entity, component)?;
    Ok(())
}

/// Tag → codec table
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    by_tag: BTreeMap<&'static str, ComponentCodec>,
    by_type: HashMap<TypeId, &'static str>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in component
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        // Built-in tags are distinct, so these cannot collide on a fresh registry
        let results = [
            self.register::<TransformComponent>(),
            self.register::<NameComponent>(),
            self.register::<ParentComponent>(),
            self.register::<SoundComponent>(),
            self.register::<UserInterfaceComponent>(),
            self.register::<MeshRendererComponent>(),
            self.register::<RigidBodyComponent>(),
        ];
        for err in results.into_iter().filter_map(Result::err) {
            log::error!("Built-in component registration failed: {}", err);
        }
    }

    /// Register `T` under its type tag
    ///
    /// Registering the same type twice is a no-op; a different type under a
    /// taken tag is rejected.
    pub fn register<T: SerializableComponent>(&mut self) -> Result<(), SerializationError> {
        let codec = ComponentCodec::of::<T>();
        if let Some(existing) = self.by_tag.get(codec.tag) {
            if existing.type_id == codec.type_id {
                return Ok(());
            }
            return Err(SerializationError::DuplicateTag {
                tag: codec.tag,
                existing: existing.type_name,
            });
        }

        log::trace!("Registered component codec '{}' for {}", codec.tag, codec.type_name);
        self.by_type.insert(codec.type_id, codec.tag);
        self.by_tag.insert(codec.tag, codec);
        Ok(())
    }

    /// Codec registered under `tag`
    pub fn codec_for_tag(&self, tag: &str) -> Option<&ComponentCodec> {
        self.by_tag.get(tag)
    }

    /// Codec for a component type
    pub fn codec_for_type(&self, type_id: TypeId) -> Option<&ComponentCodec> {
        self.by_type.get(&type_id).and_then(|tag| self.by_tag.get(tag))
    }

    /// Registered tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_tag.keys().copied()
    }

    /// Number of registered component types
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Score {
        points: u32,
    }
    impl Component for Score {}
    crate::impl_serializable_component!(Score, "test.score", { points });

    #[derive(Debug, PartialEq)]
    struct Impostor {
        points: u32,
    }
    impl Component for Impostor {}
    crate::impl_serializable_component!(Impostor, "test.score", { points });

    #[test]
    fn test_builtin_tags() {
        let registry = ComponentRegistry::with_builtin();
        assert_eq!(registry.len(), 7);
        assert!(registry.codec_for_tag("audio.sound").is_some());
        assert_eq!(
            registry
                .codec_for_type(TypeId::of::<TransformComponent>())
                .map(ComponentCodec::tag),
            Some("core.transform")
        );
    }

    #[test]
    fn test_duplicate_tag_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Score>().unwrap();
        registry.register::<Score>().unwrap();

        match registry.register::<Impostor>() {
            Err(SerializationError::DuplicateTag { tag, existing }) => {
                assert_eq!(tag, "test.score");
                assert!(existing.ends_with("Score"));
            }
            other => panic!("expected duplicate tag, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_codec_moves_component_through_bytes() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Score>().unwrap();
        let codec = *registry.codec_for_tag("test.score").unwrap();

        let mut source = World::new();
        let entity = source.create_entity();
        source.add_component(entity, Score { points: 42 }).unwrap();

        let mut writer = WireWriter::new();
        codec.encode(&source, entity, &mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut target = World::new();
        let copy = target.create_entity();
        codec.decode(&mut WireReader::new(&bytes), &mut target, copy).unwrap();
        assert_eq!(target.get_component::<Score>(copy).unwrap(), Some(&Score { points: 42 }));
    }
}
