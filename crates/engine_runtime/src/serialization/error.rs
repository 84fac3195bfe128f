//! World serialization errors

use crate::ecs::EcsError;
use thiserror::Error;

/// Errors raised while saving or loading a world
///
/// Decode errors carry the byte offset where decoding stopped. Errors raised
/// inside a component payload are wrapped in [`SerializationError::Component`]
/// with the entity record and component tag they belong to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Input does not start with the world magic
    #[error("not a serialized world: bad magic {found:?}")]
    BadMagic {
        /// First four bytes of the input
        found: [u8; 4],
    },

    /// Input was written by an incompatible format version
    #[error("unsupported world format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the input
        found: u16,
        /// Version this build reads
        expected: u16,
    },

    /// Input ended early
    #[error("unexpected end of input at byte {offset}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Where the read started
        offset: usize,
        /// Bytes the read needed
        needed: usize,
        /// Bytes that were left
        remaining: usize,
    },

    /// A string was not valid UTF-8
    #[error("invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 {
        /// Where the string bytes start
        offset: usize,
    },

    /// A boolean byte was neither 0 nor 1
    #[error("invalid boolean value {value:#04x} at byte {offset}")]
    InvalidBool {
        /// Where the byte is
        offset: usize,
        /// The byte found
        value: u8,
    },

    /// An option tag byte was neither 0 nor 1
    #[error("invalid option tag {value:#04x} at byte {offset}")]
    InvalidOptionTag {
        /// Where the byte is
        offset: usize,
        /// The byte found
        value: u8,
    },

    /// A length does not fit the 32-bit wire limit
    #[error("length {len} exceeds the 32-bit wire limit")]
    TooLarge {
        /// The offending length
        len: usize,
    },

    /// An entity field points past the serialized entities
    #[error("entity reference {ordinal} out of range at byte {offset}")]
    UnknownEntityReference {
        /// Stored entity ordinal
        ordinal: u32,
        /// Where the reference is
        offset: usize,
    },

    /// A component refers to an entity that is not saved with the world
    #[error("component references entity {entity} which is not part of the serialized world")]
    DanglingEntity {
        /// The referenced entity
        entity: String,
    },

    /// An entity record carries an out-of-range or repeated local id
    #[error("entity record {record} at byte {offset}: local id {local_id} is out of range or repeated")]
    InvalidEntityId {
        /// Position of the record in the input
        record: usize,
        /// The local id found
        local_id: u32,
        /// Where the record starts
        offset: usize,
    },

    /// A component tag has no registered codec
    #[error("unknown component type `{tag}` on entity {entity} at byte {offset}")]
    UnknownComponent {
        /// Tag found in the input
        tag: String,
        /// Local id of the entity record
        entity: u32,
        /// Where the component record starts
        offset: usize,
    },

    /// A live component type has no registered codec
    #[error("component type `{type_name}` has no registered codec")]
    UnregisteredComponent {
        /// Rust type name of the component
        type_name: &'static str,
    },

    /// Two component types were registered under one tag
    #[error("component tag `{tag}` is already registered for `{existing}`")]
    DuplicateTag {
        /// The contested tag
        tag: &'static str,
        /// Type already holding the tag
        existing: &'static str,
    },

    /// The same component type appears twice on one entity record
    #[error("duplicate component `{tag}` on entity {entity} at byte {offset}")]
    DuplicateComponent {
        /// The repeated tag
        tag: String,
        /// Local id of the entity record
        entity: u32,
        /// Where the repeated record starts
        offset: usize,
    },

    /// A component payload was not fully consumed by its decoder
    #[error("component `{tag}` on entity {entity} declared {declared} bytes but decoded {consumed}")]
    LengthMismatch {
        /// Component tag
        tag: String,
        /// Local id of the entity record
        entity: u32,
        /// Payload length in the record
        declared: usize,
        /// Bytes the decoder read
        consumed: usize,
    },

    /// Error inside one component's payload
    #[error("entity {entity}, component `{tag}`: {source}")]
    Component {
        /// Local id of the entity record
        entity: u32,
        /// Component tag
        tag: String,
        /// Underlying error
        #[source]
        source: Box<SerializationError>,
    },

    /// Bytes remain after the module section
    #[error("{count} trailing bytes after world data at byte {offset}")]
    TrailingBytes {
        /// Where the trailing data starts
        offset: usize,
        /// How many bytes remain
        count: usize,
    },

    /// The world rejected a decoded operation
    #[error("world error: {0}")]
    World(#[from] EcsError),
}

impl SerializationError {
    /// Attach entity and component context to an error from a payload
    pub(crate) fn in_component(self, entity: u32, tag: &str) -> Self {
        Self::Component {
            entity,
            tag: tag.to_string(),
            source: Box::new(self),
        }
    }
}
