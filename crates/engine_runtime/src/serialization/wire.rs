//! Little-endian wire primitives
//!
//! [`WireWriter`] and [`WireReader`] implement the scalar encodings of the
//! world format. [`WireField`] maps field types onto them so component codecs
//! can be generated field by field.

use super::SerializationError;
use crate::assets::{Asset, AssetId, AssetReference};
use crate::ecs::Entity;
use crate::foundation::math::{Quat, Quaternion, Vec3};
use std::collections::HashMap;

/// Position of a length prefix awaiting its final value
#[derive(Debug, Clone, Copy)]
#[must_use = "a length prefix must be closed with WireWriter::end_length"]
pub struct LengthMark {
    at: usize,
}

/// Appends encoded values to a byte buffer
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
    entity_ordinals: HashMap<Entity, u32>,
}

impl WireWriter {
    /// Create an empty writer that knows no entities
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer that encodes the given entities as their ordinals
    pub(crate) fn with_entities(entity_ordinals: HashMap<Entity, u32>) -> Self {
        Self {
            buf: Vec::new(),
            entity_ordinals,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes with no prefix
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append one byte
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a `u16`
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a `u32`
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a `u64`
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an `f32` bit pattern
    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a boolean as 0 or 1
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Append a length as `u32`
    pub fn write_len(&mut self, len: usize) -> Result<(), SerializationError> {
        let len = u32::try_from(len).map_err(|_| SerializationError::TooLarge { len })?;
        self.write_u32(len);
        Ok(())
    }

    /// Append a length-prefixed byte string
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerializationError> {
        self.write_len(bytes.len())?;
        self.write_raw(bytes);
        Ok(())
    }

    /// Append a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) -> Result<(), SerializationError> {
        self.write_bytes(value.as_bytes())
    }

    /// Append an entity as its ordinal in the world being written
    pub fn write_entity(&mut self, entity: Entity) -> Result<(), SerializationError> {
        let ordinal = self
            .entity_ordinals
            .get(&entity)
            .copied()
            .ok_or_else(|| SerializationError::DanglingEntity {
                entity: entity.to_string(),
            })?;
        self.write_u32(ordinal);
        Ok(())
    }

    /// Reserve a `u32` length prefix for the bytes that follow
    pub fn begin_length(&mut self) -> LengthMark {
        let at = self.buf.len();
        self.write_u32(0);
        LengthMark { at }
    }

    /// Patch `mark` with the number of bytes written since it was reserved
    pub fn end_length(&mut self, mark: LengthMark) -> Result<usize, SerializationError> {
        let len = self.buf.len() - mark.at - 4;
        let encoded = u32::try_from(len).map_err(|_| SerializationError::TooLarge { len })?;
        self.buf[mark.at..mark.at + 4].copy_from_slice(&encoded.to_le_bytes());
        Ok(len)
    }
}

/// Reads encoded values from a byte slice
///
/// Offsets are absolute within the original input, including inside
/// sub-readers, so errors point at the right byte.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
    entities: &'a [Entity],
}

impl<'a> WireReader<'a> {
    /// Read `bytes` with no entity table
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
            entities: &[],
        }
    }

    /// Read `bytes`, mapping entity ordinals through `entities`
    pub(crate) fn with_entities(bytes: &'a [u8], entities: &'a [Entity]) -> Self {
        Self {
            entities,
            ..Self::new(bytes)
        }
    }

    /// Absolute offset of the next byte
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Take the next `len` bytes as an independent reader
    pub fn sub_reader(&mut self, len: usize) -> Result<WireReader<'a>, SerializationError> {
        let base = self.offset();
        let bytes = self.take(len)?;
        Ok(WireReader {
            bytes,
            pos: 0,
            base,
            entities: self.entities,
        })
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> Result<(), SerializationError> {
        self.take(len).map(|_| ())
    }

    /// Read `len` raw bytes
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], SerializationError> {
        self.take(len)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.array::<1>()?[0])
    }

    /// Read a `u16`
    pub fn read_u16(&mut self) -> Result<u16, SerializationError> {
        self.array().map(u16::from_le_bytes)
    }

    /// Read a `u32`
    pub fn read_u32(&mut self) -> Result<u32, SerializationError> {
        self.array().map(u32::from_le_bytes)
    }

    /// Read a `u64`
    pub fn read_u64(&mut self) -> Result<u64, SerializationError> {
        self.array().map(u64::from_le_bytes)
    }

    /// Read an `f32` bit pattern
    pub fn read_f32(&mut self) -> Result<f32, SerializationError> {
        self.array().map(f32::from_le_bytes)
    }

    /// Read a boolean, rejecting bytes other than 0 and 1
    pub fn read_bool(&mut self) -> Result<bool, SerializationError> {
        let offset = self.offset();
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SerializationError::InvalidBool { offset, value }),
        }
    }

    /// Read a `u32` length
    pub fn read_len(&mut self) -> Result<usize, SerializationError> {
        Ok(self.read_u32()? as usize)
    }

    /// Read a length-prefixed byte string
    pub fn read_bytes(&mut self) -> Result<&'a [u8], SerializationError> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_str(&mut self) -> Result<&'a str, SerializationError> {
        let len = self.read_len()?;
        let offset = self.offset();
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| SerializationError::InvalidUtf8 { offset })
    }

    /// Read an entity ordinal and map it to the recreated entity
    pub fn read_entity(&mut self) -> Result<Entity, SerializationError> {
        let offset = self.offset();
        let ordinal = self.read_u32()?;
        self.entities
            .get(ordinal as usize)
            .copied()
            .ok_or(SerializationError::UnknownEntityReference { ordinal, offset })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SerializationError> {
        if len > self.remaining() {
            return Err(SerializationError::UnexpectedEof {
                offset: self.offset(),
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes[start..self.pos])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// A value that can appear as a component field
pub trait WireField: Sized {
    /// Encode `self`
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError>;

    /// Decode a value
    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError>;
}

macro_rules! impl_wire_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireField for $ty {
                fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
                    writer.write_raw(&self.to_le_bytes());
                    Ok(())
                }

                fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
                    reader.array().map(<$ty>::from_le_bytes)
                }
            }
        )*
    };
}

impl_wire_int!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl WireField for bool {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_bool(*self);
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        reader.read_bool()
    }
}

impl WireField for String {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_str(self)
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        reader.read_str().map(str::to_owned)
    }
}

impl<T: WireField> WireField for Vec<T> {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_len(self.len())?;
        self.iter().try_for_each(|item| item.write(writer))
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        let len = reader.read_len()?;
        // Every element takes at least one byte
        let mut items = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            items.push(T::read(reader)?);
        }
        Ok(items)
    }
}

impl<T: WireField> WireField for Option<T> {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        match self {
            None => {
                writer.write_u8(0);
                Ok(())
            }
            Some(value) => {
                writer.write_u8(1);
                value.write(writer)
            }
        }
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        let offset = reader.offset();
        match reader.read_u8()? {
            0 => Ok(None),
            1 => T::read(reader).map(Some),
            value => Err(SerializationError::InvalidOptionTag { offset, value }),
        }
    }
}

impl WireField for Vec3 {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        Ok(Self::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?))
    }
}

impl WireField for Quat {
    // Stored as i, j, k, w
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        for component in self.coords.iter() {
            writer.write_f32(*component);
        }
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        let (i, j, k, w) = (
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
        );
        // Written from a unit quaternion; renormalising would change the bits
        Ok(Self::new_unchecked(Quaternion::new(w, i, j, k)))
    }
}

impl WireField for Entity {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_entity(*self)
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        reader.read_entity()
    }
}

impl WireField for AssetId {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        writer.write_str(self.as_str())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        reader.read_str().map(Self::new)
    }
}

impl<T: Asset> WireField for AssetReference<T> {
    fn write(&self, writer: &mut WireWriter) -> Result<(), SerializationError> {
        self.id().write(writer)
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, SerializationError> {
        AssetId::read(reader).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    #[test]
    fn test_scalars_are_little_endian() {
        let mut writer = WireWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        0x0708_i32.write(&mut writer).unwrap();
        assert_eq!(
            writer.into_bytes(),
            vec![0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0x08, 0x07, 0x00, 0x00]
        );
    }

    #[test]
    fn test_strings_are_length_prefixed_utf8() {
        let mut writer = WireWriter::new();
        writer.write_str("héllo").unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..4], &6u32.to_le_bytes());

        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_str().unwrap(), "héllo");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_invalid_utf8_reports_offset() {
        let bytes = [2, 0, 0, 0, 0xc3, 0x28];
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_str(), Err(SerializationError::InvalidUtf8 { offset: 4 }));
    }

    #[test]
    fn test_bool_rejects_other_bytes() {
        let mut reader = WireReader::new(&[1, 0, 2]);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert_eq!(
            reader.read_bool(),
            Err(SerializationError::InvalidBool { offset: 2, value: 2 })
        );
    }

    #[test]
    fn test_truncated_read_reports_position() {
        let mut reader = WireReader::new(&[1, 2, 3, 4, 5]);
        reader.read_u8().unwrap();
        assert_eq!(
            reader.read_u64(),
            Err(SerializationError::UnexpectedEof { offset: 1, needed: 8, remaining: 4 })
        );
    }

    #[test]
    fn test_sub_reader_keeps_absolute_offsets() {
        let bytes = [9, 9, 9, 0, 0, 7];
        let mut reader = WireReader::new(&bytes);
        reader.skip(3).unwrap();
        let mut inner = reader.sub_reader(2).unwrap();
        assert_eq!(inner.offset(), 3);
        inner.read_u16().unwrap();
        assert_eq!(
            inner.read_u8(),
            Err(SerializationError::UnexpectedEof { offset: 5, needed: 1, remaining: 0 })
        );
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_length_mark_patches_prefix() {
        let mut writer = WireWriter::new();
        let mark = writer.begin_length();
        writer.write_raw(&[1, 2, 3]);
        assert_eq!(writer.end_length(mark).unwrap(), 3);
        assert_eq!(writer.into_bytes(), vec![3, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_option_and_vec_fields() {
        let value: Vec<Option<u16>> = vec![Some(4), None, Some(9)];
        let mut writer = WireWriter::new();
        value.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = WireReader::new(&bytes);
        assert_eq!(Vec::<Option<u16>>::read(&mut reader).unwrap(), value);

        let mut bad = WireReader::new(&[3]);
        assert_eq!(
            Option::<u8>::read(&mut bad),
            Err(SerializationError::InvalidOptionTag { offset: 0, value: 3 })
        );
    }

    #[test]
    fn test_entity_fields_use_ordinals() {
        let mut world = World::new();
        let first = world.create_entity();
        let second = world.create_entity();
        let stray = World::new().create_entity();

        let ordinals = HashMap::from([(first, 0), (second, 1)]);
        let mut writer = WireWriter::with_entities(ordinals);
        second.write(&mut writer).unwrap();
        assert!(matches!(
            stray.write(&mut writer),
            Err(SerializationError::DanglingEntity { .. })
        ));
        let bytes = writer.into_bytes();
        assert_eq!(bytes, 1u32.to_le_bytes().to_vec());

        let table = [second, first];
        let mut reader = WireReader::with_entities(&bytes, &table);
        assert_eq!(Entity::read(&mut reader).unwrap(), first);

        let mut empty = WireReader::new(&bytes);
        assert_eq!(
            Entity::read(&mut empty),
            Err(SerializationError::UnknownEntityReference { ordinal: 1, offset: 0 })
        );
    }
}
