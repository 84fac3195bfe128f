//! Asset management system
//!
//! Assets are addressed by a stable [`AssetId`]. Components hold
//! [`AssetReference`] values that carry only the identity plus a weak link
//! to the loaded instance; the [`AssetServer`] owns every loaded asset and
//! guarantees one shared instance per identity.

pub mod reference;
pub mod server;
pub mod loader;
pub mod global;

pub use reference::AssetReference;
pub use server::{AssetServer, LoadState};
pub use loader::{AssetLoader, AssetSource, TypedLoader, FileSource, MemorySource};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Asset trait for loadable resources
pub trait Asset: Sized + Send + Sync + 'static {
    /// Tag naming the asset kind, reported in type mismatch errors
    const KIND: &'static str;

    /// Load asset from raw bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError>;
}

/// Stable asset identity
///
/// A normalised relative path such as `music/theme.ogg`: backslashes become
/// forward slashes and a leading `./` is dropped, so the same file always
/// maps to the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    /// Create a normalised identity
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into().replace('\\', "/");
        let trimmed = path.trim_start_matches("./");
        if trimmed.len() == path.len() {
            Self(path)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Identity as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension of the last path segment, without the dot
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.0.rsplit('/').next()?;
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for AssetId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&AssetId> for AssetId {
    fn from(id: &AssetId) -> Self {
        id.clone()
    }
}

/// A loaded asset instance, type-erased
///
/// Cloning shares the same instance.
#[derive(Clone)]
pub struct LoadedAsset {
    id: AssetId,
    kind: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl LoadedAsset {
    /// Wrap a freshly loaded asset
    pub fn new<T: Asset>(id: AssetId, asset: T) -> Self {
        Self {
            id,
            kind: T::KIND,
            value: Arc::new(asset),
        }
    }

    /// Identity the asset was loaded for
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// Kind tag of the loaded asset
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Strongly-typed access to the shared instance
    pub fn downcast<T: Asset>(&self) -> Result<Arc<T>, AssetError> {
        Arc::clone(&self.value)
            .downcast::<T>()
            .map_err(|_| AssetError::TypeMismatch {
                id: self.id.clone(),
                expected: T::KIND,
                found: self.kind,
            })
    }

    /// Whether both values share one instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// No loader or source could produce the asset
    #[error("Asset not found: {id} ({detail})")]
    NotFound {
        /// Requested identity
        id: AssetId,
        /// Which step of the lookup failed
        detail: String,
    },

    /// The asset loaded as a different type than requested
    #[error("Asset {id} is a {found}, not a {expected}")]
    TypeMismatch {
        /// Requested identity
        id: AssetId,
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind that was actually loaded
        found: &'static str,
    },

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// No process-wide asset server is installed
    #[error("No global asset server installed")]
    NoGlobalServer,
}
