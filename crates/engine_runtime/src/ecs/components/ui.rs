//! User interface component

use crate::assets::{AssetId, AssetReference};
use crate::ecs::Component;
use crate::ui::UserInterfaceAsset;

/// Shows a user interface document
#[derive(Debug, Clone, PartialEq)]
pub struct UserInterfaceComponent {
    /// Document to display
    pub document: AssetReference<UserInterfaceAsset>,
    /// Whether the document is shown
    pub visible: bool,
    /// Draw order; higher values draw on top
    pub sort_order: i32,
}

impl UserInterfaceComponent {
    /// Create a visible interface at sort order 0
    pub fn new(document: impl Into<AssetId>) -> Self {
        Self {
            document: AssetReference::new(document),
            visible: true,
            sort_order: 0,
        }
    }
}

impl Component for UserInterfaceComponent {}

crate::impl_serializable_component!(UserInterfaceComponent, "ui.document", {
    document,
    visible,
    sort_order,
});
