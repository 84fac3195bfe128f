//! Concurrent asset resolution through the runtime's shared cache

use engine_runtime::assets::{AssetLoader, LoadedAsset, MemorySource, TypedLoader};
use engine_runtime::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const TITLE: &[u8] = br#"(title: "Title", elements: [Text(id: "name", text: "Rusteroids")])"#;

/// Interface loader that counts calls and stalls to widen the race window
struct CountingUiLoader {
    inner: TypedLoader<UserInterfaceAsset>,
    calls: Arc<AtomicUsize>,
}

impl AssetLoader for CountingUiLoader {
    fn name(&self) -> &str {
        "counting-ui"
    }

    fn accepts(&self, id: &AssetId) -> bool {
        self.inner.accepts(id)
    }

    fn load(&self, id: &AssetId, bytes: &[u8]) -> Result<LoadedAsset, AssetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        self.inner.load(id, bytes)
    }
}

#[test]
fn concurrent_references_share_one_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = Arc::new(AssetServer::new());
    server.register_loader(CountingUiLoader {
        inner: TypedLoader::new(&["uiasset"]),
        calls: Arc::clone(&calls),
    });
    server.add_source(Arc::new(MemorySource::new().with("ui/title.uiasset", TITLE.to_vec())));

    let mut world = World::new();
    let menu = world.create_entity();
    let overlay = world.create_entity();
    world
        .add_component(menu, UserInterfaceComponent::new("ui/title.uiasset"))
        .unwrap();
    world
        .add_component(overlay, UserInterfaceComponent::new("./ui/title.uiasset"))
        .unwrap();

    let references: Vec<AssetReference<UserInterfaceAsset>> = world
        .query::<UserInterfaceComponent>()
        .into_iter()
        .map(|(_, ui)| ui.document.clone())
        .collect();
    assert_eq!(references[0], references[1]);

    let barrier = Barrier::new(references.len());
    let resolved: Vec<Arc<UserInterfaceAsset>> = std::thread::scope(|scope| {
        let handles: Vec<_> = references
            .iter()
            .map(|reference| {
                let server = &server;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    reference.resolve(server).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&resolved[0], &resolved[1]));
    assert_eq!(resolved[0].title, "Title");
    assert!(references.iter().all(AssetReference::is_resolved));
}

#[test]
fn wrong_kind_and_missing_assets_surface_errors() {
    let mut runtime = Runtime::with_default_subsystems(RuntimeConfig::default()).unwrap();
    runtime.initialize().unwrap();
    runtime.assets().add_source(Arc::new(
        MemorySource::new().with("ui/title.uiasset", TITLE.to_vec()),
    ));

    let as_sound: AssetReference<SoundClip> = AssetReference::new("ui/title.uiasset");
    assert!(matches!(
        as_sound.resolve(runtime.assets()),
        Err(AssetError::TypeMismatch { expected: "sound_clip", found: "user_interface", .. })
    ));

    let missing: AssetReference<SoundClip> = AssetReference::new("music/missing.ogg");
    assert!(matches!(
        missing.resolve(runtime.assets()),
        Err(AssetError::NotFound { .. })
    ));
    assert!(!missing.is_resolved());
}

#[test]
fn references_do_not_keep_evicted_assets_alive() {
    let mut runtime = Runtime::with_default_subsystems(RuntimeConfig::default()).unwrap();
    runtime.initialize().unwrap();
    runtime.assets().add_source(Arc::new(
        MemorySource::new().with("materials/wood.material", b"(name: \"wood\")".to_vec()),
    ));

    let reference: AssetReference<MaterialAsset> = AssetReference::new("materials/wood.material");
    let material = reference.resolve(runtime.assets()).unwrap();
    assert_eq!(material.name, "wood");
    drop(material);

    runtime.shutdown();
    assert!(reference.asset().is_none());
    assert!(!reference.is_resolved());
}
