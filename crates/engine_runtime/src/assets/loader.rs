//! Loader chain and byte sources
//!
//! A loader turns bytes into an asset of one kind; a source finds the bytes
//! for an identity. The [`AssetServer`](super::AssetServer) asks the first
//! loader that accepts an identity, then the first source that has it.

use super::{Asset, AssetError, AssetId, LoadedAsset};
use crate::config::AssetConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Decodes bytes into a loaded asset
pub trait AssetLoader: Send + Sync {
    /// Loader name, for diagnostics
    fn name(&self) -> &str;

    /// Whether this loader handles `id`
    fn accepts(&self, id: &AssetId) -> bool;

    /// Decode `bytes` loaded for `id`
    fn load(&self, id: &AssetId, bytes: &[u8]) -> Result<LoadedAsset, AssetError>;
}

/// Loader for any [`Asset`] type, selected by file extension
pub struct TypedLoader<T: Asset> {
    extensions: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> TypedLoader<T> {
    /// Create a loader for the given extensions (without dots, case-insensitive)
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|ext| ext.to_ascii_lowercase()).collect(),
            _marker: PhantomData,
        }
    }
}

impl<T: Asset> AssetLoader for TypedLoader<T> {
    fn name(&self) -> &str {
        T::KIND
    }

    fn accepts(&self, id: &AssetId) -> bool {
        id.extension().is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
    }

    fn load(&self, id: &AssetId, bytes: &[u8]) -> Result<LoadedAsset, AssetError> {
        let asset = T::from_bytes(bytes)?;
        Ok(LoadedAsset::new(id.clone(), asset))
    }
}

/// Provides raw bytes for asset identities
pub trait AssetSource: Send + Sync {
    /// Source name, for diagnostics
    fn name(&self) -> &str;

    /// Bytes for `id`, or `None` when this source does not have it
    fn read(&self, id: &AssetId) -> Result<Option<Vec<u8>>, AssetError>;
}

/// Reads assets from disk
///
/// Each search path is tried in order. Identities that are absolute or climb
/// out with `..` are never read.
#[derive(Debug, Clone)]
pub struct FileSource {
    search_paths: Vec<PathBuf>,
}

impl FileSource {
    /// Create a file source over the given directories
    pub fn new<P: Into<PathBuf>>(search_paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a file source from asset configuration
    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.search_paths.iter().cloned())
    }

    fn locate(&self, id: &AssetId) -> Option<PathBuf> {
        let relative = Path::new(id.as_str());
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained {
            log::warn!("Refusing asset identity {} outside the search paths", id);
            return None;
        }

        self.search_paths
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

impl AssetSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn read(&self, id: &AssetId) -> Result<Option<Vec<u8>>, AssetError> {
        let Some(path) = self.locate(id) else {
            return Ok(None);
        };
        log::trace!("Reading {} from {}", id, path.display());
        Ok(Some(std::fs::read(&path)?))
    }
}

/// In-memory asset bytes
///
/// Entries can be added after the source was handed to a server.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<AssetId, Arc<[u8]>>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under `id`
    pub fn insert(&self, id: impl Into<AssetId>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.entries.write().insert(id.into(), Arc::from(bytes));
    }

    /// Builder-style [`MemorySource::insert`]
    #[must_use]
    pub fn with(self, id: impl Into<AssetId>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(id, bytes);
        self
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no entries are stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl AssetSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn read(&self, id: &AssetId) -> Result<Option<Vec<u8>>, AssetError> {
        Ok(self.entries.read().get(id).map(|bytes| bytes.to_vec()))
    }
}
