//! Opaque per-subsystem state carried by a world

use std::collections::BTreeMap;

/// Named byte blobs that subsystems persist alongside a world
///
/// The world never interprets the bytes. Entries iterate in name order so
/// serialized output stays deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleState {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ModuleState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `module`
    pub fn get(&self, module: &str) -> Option<&[u8]> {
        self.entries.get(module).map(Vec::as_slice)
    }

    /// Store bytes for `module`, returning the previous value
    pub fn insert(&mut self, module: impl Into<String>, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(module.into(), bytes)
    }

    /// Remove the entry for `module`
    pub fn remove(&mut self, module: &str) -> Option<Vec<u8>> {
        self.entries.remove(module)
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no module stored anything
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
