//! Identity-based asset handles

use super::{global, Asset, AssetError, AssetId, AssetServer};
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Handle to an asset by identity
///
/// Holds the [`AssetId`] plus a weak link to the loaded instance once it has
/// been resolved. The reference never keeps an asset alive; the
/// [`AssetServer`] owns it. Two references with the same identity resolve to
/// the same instance.
///
/// Equality and hashing consider the identity only.
pub struct AssetReference<T: Asset> {
    id: AssetId,
    link: RwLock<Weak<T>>,
}

impl<T: Asset> AssetReference<T> {
    /// Create an unresolved reference
    pub fn new(id: impl Into<AssetId>) -> Self {
        Self {
            id: id.into(),
            link: RwLock::new(Weak::new()),
        }
    }

    /// Identity of the referenced asset
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// The resolved asset, or `None` if not resolved yet (or since evicted)
    pub fn asset(&self) -> Option<Arc<T>> {
        self.link.read().upgrade()
    }

    /// Whether the reference currently points at a live instance
    pub fn is_resolved(&self) -> bool {
        self.link.read().strong_count() > 0
    }

    /// Resolve through `server`, loading on first use
    pub fn resolve(&self, server: &AssetServer) -> Result<Arc<T>, AssetError> {
        if let Some(asset) = self.asset() {
            return Ok(asset);
        }
        let asset = server.resolve_as::<T>(&self.id)?;
        *self.link.write() = Arc::downgrade(&asset);
        Ok(asset)
    }

    /// Resolve through the process-wide server
    pub fn resolve_global(&self) -> Result<Arc<T>, AssetError> {
        let server = global::installed().ok_or(AssetError::NoGlobalServer)?;
        self.resolve(&server)
    }
}

impl<T: Asset> Clone for AssetReference<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            link: RwLock::new(self.link.read().clone()),
        }
    }
}

impl<T: Asset> PartialEq for AssetReference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Asset> Eq for AssetReference<T> {}

impl<T: Asset> Hash for AssetReference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Asset> fmt::Debug for AssetReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetReference")
            .field("id", &self.id)
            .field("kind", &T::KIND)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T: Asset> From<AssetId> for AssetReference<T> {
    fn from(id: AssetId) -> Self {
        Self::new(id)
    }
}

impl<T: Asset> From<&str> for AssetReference<T> {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
