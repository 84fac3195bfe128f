//! Component trait

/// Marker trait for components
///
/// Components that should survive a save/load cycle also implement
/// [`SerializableComponent`](crate::serialization::SerializableComponent).
pub trait Component: 'static + Send + Sync {}
