//! UI subsystem
//!
//! Registers the [`UserInterfaceAsset`] loader and keeps a [`UiLayer`] per
//! world listing the documents its visible interface components show.

use crate::assets::{Asset, AssetError, AssetServer, TypedLoader};
use crate::ecs::components::UserInterfaceComponent;
use crate::ecs::{Entity, World, WorldId};
use crate::events::{Subscription, WorldWasCreated, WorldWasDestroyed};
use crate::subsystem::{PerWorldState, Subsystem, SubsystemContext, SubsystemError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Extension of interface documents
pub const UI_EXTENSION: &str = "uiasset";

/// Horizontal and vertical anchoring of an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Top-left corner
    #[default]
    TopLeft,
    /// Top edge, centered
    TopCenter,
    /// Screen center
    Center,
    /// Bottom edge, centered
    BottomCenter,
    /// Bottom-right corner
    BottomRight,
}

/// One node of an interface document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiElement {
    /// Container with a background color
    Panel {
        /// Element id
        id: String,
        /// Linear RGBA color
        #[serde(default)]
        color: [f32; 4],
        /// Child elements
        #[serde(default)]
        children: Vec<UiElement>,
    },
    /// Static text
    Text {
        /// Element id
        id: String,
        /// Text content
        text: String,
    },
    /// Clickable button
    Button {
        /// Element id
        id: String,
        /// Button label
        label: String,
    },
}

impl UiElement {
    /// Element id
    pub fn id(&self) -> &str {
        match self {
            Self::Panel { id, .. } | Self::Text { id, .. } | Self::Button { id, .. } => id,
        }
    }

    fn count(&self) -> usize {
        match self {
            Self::Panel { children, .. } => 1 + children.iter().map(Self::count).sum::<usize>(),
            _ => 1,
        }
    }
}

/// Interface document, stored as RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInterfaceAsset {
    /// Document title
    pub title: String,
    /// Anchor of the root elements
    #[serde(default)]
    pub anchor: Anchor,
    /// Root elements
    #[serde(default)]
    pub elements: Vec<UiElement>,
}

impl UserInterfaceAsset {
    /// Number of elements including nested ones
    pub fn element_count(&self) -> usize {
        self.elements.iter().map(UiElement::count).sum()
    }
}

impl Asset for UserInterfaceAsset {
    const KIND: &'static str = "user_interface";

    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AssetError::InvalidData(format!("interface is not UTF-8: {}", e)))?;
        ron::from_str(text).map_err(|e| AssetError::InvalidData(format!("interface: {}", e)))
    }
}

/// A document ready for display
#[derive(Debug, Clone)]
pub struct ShownDocument {
    /// Owning entity
    pub entity: Entity,
    /// Loaded document
    pub document: Arc<UserInterfaceAsset>,
    /// Draw order
    pub sort_order: i32,
}

/// UI state parallel to one ECS world
#[derive(Debug, Clone)]
pub struct UiLayer {
    world: WorldId,
    shown: Vec<ShownDocument>,
}

impl UiLayer {
    /// Create an empty layer
    pub fn new(world: WorldId) -> Self {
        Self {
            world,
            shown: Vec::new(),
        }
    }

    /// World this layer belongs to
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Documents from the last refresh, back to front
    pub fn shown(&self) -> &[ShownDocument] {
        &self.shown
    }

    /// Rebuild the shown documents from the visible interface components of `ecs`
    ///
    /// Documents draw in ascending sort order; ties keep creation order.
    pub fn refresh(&mut self, ecs: &World, assets: &AssetServer) -> Vec<(Entity, AssetError)> {
        let mut failures = Vec::new();
        self.shown.clear();

        for (entity, ui) in ecs.query::<UserInterfaceComponent>() {
            if !ui.visible {
                continue;
            }
            match ui.document.resolve(assets) {
                Ok(document) => self.shown.push(ShownDocument {
                    entity,
                    document,
                    sort_order: ui.sort_order,
                }),
                Err(err) => {
                    log::warn!("Interface on {} cannot show {}: {}", entity, ui.document.id(), err);
                    failures.push((entity, err));
                }
            }
        }
        self.shown.sort_by_key(|shown| shown.sort_order);
        failures
    }
}

/// Loads interface documents and tracks per-world layers
#[derive(Debug, Default)]
pub struct UiSubsystem {
    layers: PerWorldState<UiLayer>,
    subscriptions: Vec<Subscription>,
}

impl UiSubsystem {
    /// Create the subsystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer of `world`
    pub fn layer(&self, world: WorldId) -> Option<Arc<Mutex<UiLayer>>> {
        self.layers.get(world)
    }
}

impl Subsystem for UiSubsystem {
    fn name(&self) -> &str {
        "ui"
    }

    fn initialize(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError> {
        context
            .assets
            .register_loader(TypedLoader::<UserInterfaceAsset>::new(&[UI_EXTENSION]));

        for (world, _) in &context.live_worlds {
            self.layers.insert(*world, UiLayer::new(*world));
        }

        let layers = self.layers.clone();
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasCreated| {
            layers.insert(event.world, UiLayer::new(event.world));
            Ok(())
        }));
        let layers = self.layers.clone();
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasDestroyed| {
            layers.remove(event.world);
            Ok(())
        }));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.subscriptions.clear();
        self.layers.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::events::EventBus;

    const TITLE: &str = r#"(
        title: "Main Menu",
        anchor: Center,
        elements: [
            Panel(id: "root", color: (0.0, 0.0, 0.0, 0.8), children: [
                Text(id: "heading", text: "Rusteroids"),
                Button(id: "start", label: "Start"),
            ]),
        ],
    )"#;

    #[test]
    fn test_document_parses() {
        let document = UserInterfaceAsset::from_bytes(TITLE.as_bytes()).unwrap();
        assert_eq!(document.title, "Main Menu");
        assert_eq!(document.anchor, Anchor::Center);
        assert_eq!(document.element_count(), 3);
        assert_eq!(document.elements[0].id(), "root");
    }

    #[test]
    fn test_layer_orders_visible_documents() {
        let events = Arc::new(EventBus::new());
        let assets = Arc::new(AssetServer::new());
        assets.add_source(Arc::new(
            MemorySource::new().with("ui/title.uiasset", TITLE.as_bytes().to_vec()),
        ));
        let mut ui = UiSubsystem::new();
        ui.initialize(&SubsystemContext {
            events: Arc::clone(&events),
            assets: Arc::clone(&assets),
            live_worlds: Vec::new(),
        })
        .unwrap();

        let mut world = World::new();
        world.announce(Arc::clone(&events)).unwrap();
        let overlay = world.create_entity();
        let mut on_top = UserInterfaceComponent::new("ui/title.uiasset");
        on_top.sort_order = 10;
        world.add_component(overlay, on_top).unwrap();
        let menu = world.create_entity();
        world.add_component(menu, UserInterfaceComponent::new("ui/title.uiasset")).unwrap();
        let hidden = world.create_entity();
        let mut invisible = UserInterfaceComponent::new("ui/missing.uiasset");
        invisible.visible = false;
        world.add_component(hidden, invisible).unwrap();

        let layer = ui.layer(world.id()).unwrap();
        let failures = layer.lock().refresh(&world, &assets);
        assert!(failures.is_empty());

        let layer = layer.lock();
        let order: Vec<Entity> = layer.shown().iter().map(|shown| shown.entity).collect();
        assert_eq!(order, vec![menu, overlay]);
        assert!(Arc::ptr_eq(&layer.shown()[0].document, &layer.shown()[1].document));
        assert_eq!(assets.load_count(), 1);
    }
}
