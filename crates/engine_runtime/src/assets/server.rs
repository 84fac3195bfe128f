//! Asset server - shared cache of loaded assets
//!
//! The server is the single owner of loaded assets. Every identity gets one
//! cache slot; the first request for an identity runs the load while any
//! concurrent request for the same identity waits on that slot, so an
//! identity is never loaded twice at once and all requesters observe the
//! same instance.
//!
//! Failed loads leave the slot empty. The error goes to the requester and
//! the next request tries again; nothing here retries on its own.
//!
//! [`AssetServer::request`] starts a load on a worker thread and returns at
//! once, so a caller that must not block can poll [`AssetServer::load_state`]
//! and pick the instance up through [`AssetServer::try_get`].

use super::loader::{AssetLoader, AssetSource, FileSource};
use super::{Asset, AssetError, AssetId, LoadedAsset};
use crate::config::AssetConfig;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Progress of an identity through the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never requested, evicted, or never attempted
    Unrequested,
    /// A load is running
    Loading,
    /// Loaded and cached
    Loaded,
    /// The last attempt failed
    Failed,
}

#[derive(Default)]
struct AssetSlot {
    cell: OnceCell<LoadedAsset>,
    loading: AtomicBool,
    // Set while a background request owns the slot
    requested: AtomicBool,
    failed: AtomicBool,
}

/// A slot may be dropped only when its instance is loaded or nobody but the
/// cache holds it; otherwise a load could be running against it.
fn is_in_flight(slot: &Arc<AssetSlot>) -> bool {
    slot.cell.get().is_none()
        && (Arc::strong_count(slot) > 1
            || slot.loading.load(Ordering::SeqCst)
            || slot.requested.load(Ordering::SeqCst))
}

/// Resolves asset identities to shared loaded instances
pub struct AssetServer {
    loaders: RwLock<Vec<Arc<dyn AssetLoader>>>,
    sources: RwLock<Vec<Arc<dyn AssetSource>>>,
    slots: Mutex<HashMap<AssetId, Arc<AssetSlot>>>,
    loads: AtomicU64,
}

impl AssetServer {
    /// Create a server with no loaders or sources
    pub fn new() -> Self {
        Self {
            loaders: RwLock::new(Vec::new()),
            sources: RwLock::new(Vec::new()),
            slots: Mutex::new(HashMap::new()),
            loads: AtomicU64::new(0),
        }
    }

    /// Create a server reading from the configured search paths
    pub fn from_config(config: &AssetConfig) -> Self {
        let server = Self::new();
        server.add_source(Arc::new(FileSource::from_config(config)));
        server
    }

    /// Append a loader to the chain
    ///
    /// Loaders are consulted in registration order. Names are unique: a
    /// loader whose name is already registered is ignored and `false` is
    /// returned.
    pub fn register_loader(&self, loader: impl AssetLoader + 'static) -> bool {
        let mut loaders = self.loaders.write();
        if loaders.iter().any(|existing| existing.name() == loader.name()) {
            log::debug!("Asset loader '{}' already registered", loader.name());
            return false;
        }
        log::debug!("Registered asset loader '{}'", loader.name());
        loaders.push(Arc::new(loader));
        true
    }

    /// Number of registered loaders
    pub fn loader_count(&self) -> usize {
        self.loaders.read().len()
    }

    /// Append a byte source
    ///
    /// Sources are consulted in registration order.
    pub fn add_source(&self, source: Arc<dyn AssetSource>) {
        log::debug!("Registered asset source '{}'", source.name());
        self.sources.write().push(source);
    }

    /// Resolve `id` to its shared loaded instance, loading it if needed
    ///
    /// Blocks while another thread is loading the same identity.
    pub fn resolve(&self, id: &AssetId) -> Result<LoadedAsset, AssetError> {
        let slot = self.slot(id);
        self.resolve_in(id, &slot)
    }

    /// Start loading `id` on a worker thread without waiting for it
    ///
    /// Returns [`LoadState::Loaded`] when the instance is already cached and
    /// [`LoadState::Loading`] otherwise. A request for an identity that is
    /// already loading starts nothing new.
    pub fn request(self: &Arc<Self>, id: &AssetId) -> Result<LoadState, AssetError> {
        let slot = self.slot(id);
        if slot.cell.get().is_some() {
            return Ok(LoadState::Loaded);
        }
        if slot.requested.swap(true, Ordering::SeqCst) {
            return Ok(LoadState::Loading);
        }

        let server = Arc::clone(self);
        let worker_slot = Arc::clone(&slot);
        let worker_id = id.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("asset-load {id}"))
            .spawn(move || {
                if server.resolve_in(&worker_id, &worker_slot).is_ok() {
                    log::trace!("Background load of {} finished", worker_id);
                }
                worker_slot.requested.store(false, Ordering::SeqCst);
            });

        if let Err(err) = spawned {
            slot.requested.store(false, Ordering::SeqCst);
            return Err(err.into());
        }
        Ok(LoadState::Loading)
    }

    fn resolve_in(&self, id: &AssetId, slot: &AssetSlot) -> Result<LoadedAsset, AssetError> {
        let result = slot.cell.get_or_try_init(|| {
            slot.loading.store(true, Ordering::SeqCst);
            let loaded = self.load_uncached(id);
            slot.failed.store(loaded.is_err(), Ordering::SeqCst);
            slot.loading.store(false, Ordering::SeqCst);
            loaded
        });

        match result {
            Ok(asset) => Ok(asset.clone()),
            Err(err) => {
                log::warn!("Failed to resolve {id}: {err}");
                Err(err)
            }
        }
    }

    /// Resolve `id` and check it is a `T`
    pub fn resolve_as<T: Asset>(&self, id: &AssetId) -> Result<Arc<T>, AssetError> {
        self.resolve(id)?.downcast::<T>()
    }

    /// Cached instance for `id`, without loading
    pub fn try_get(&self, id: &AssetId) -> Option<LoadedAsset> {
        let slot = self.slots.lock().get(id).cloned()?;
        slot.cell.get().cloned()
    }

    /// Where `id` stands in the cache
    pub fn load_state(&self, id: &AssetId) -> LoadState {
        let Some(slot) = self.slots.lock().get(id).cloned() else {
            return LoadState::Unrequested;
        };
        if slot.cell.get().is_some() {
            LoadState::Loaded
        } else if slot.loading.load(Ordering::SeqCst) || slot.requested.load(Ordering::SeqCst) {
            LoadState::Loading
        } else if slot.failed.load(Ordering::SeqCst) {
            LoadState::Failed
        } else {
            LoadState::Unrequested
        }
    }

    /// Drop the cached instance for `id`
    ///
    /// Holders of strong handles keep their instance; references resolve a
    /// fresh one next time. A slot whose load is still running stays, so
    /// waiting requesters and later ones share that single load.
    pub fn evict(&self, id: &AssetId) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(id) {
            Some(slot) if is_in_flight(slot) => {
                log::debug!("Not evicting {}: load in flight", id);
                false
            }
            Some(_) => {
                slots.remove(id);
                log::debug!("Evicted asset {}", id);
                true
            }
            None => false,
        }
    }

    /// Drop every cached instance, keeping slots with a load in flight
    pub fn clear(&self) {
        let (cleared, kept) = {
            let mut slots = self.slots.lock();
            let before = slots.len();
            slots.retain(|_, slot| is_in_flight(slot));
            (before - slots.len(), slots.len())
        };
        log::debug!("Cleared {} asset slot(s), {} still loading", cleared, kept);
    }

    /// Number of identities currently loaded
    pub fn loaded_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.cell.get().is_some())
            .count()
    }

    /// Number of loads started since the server was created
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    fn slot(&self, id: &AssetId) -> Arc<AssetSlot> {
        Arc::clone(self.slots.lock().entry(id.clone()).or_default())
    }

    fn load_uncached(&self, id: &AssetId) -> Result<LoadedAsset, AssetError> {
        let loader = self
            .loaders
            .read()
            .iter()
            .find(|loader| loader.accepts(id))
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                id: id.clone(),
                detail: "no registered loader accepts this identity".to_string(),
            })?;

        let bytes = self.read_bytes(id)?;

        self.loads.fetch_add(1, Ordering::SeqCst);
        let asset = loader.load(id, &bytes)?;
        log::debug!(
            "Loaded {} as {} ({} bytes, loader '{}')",
            id,
            asset.kind(),
            bytes.len(),
            loader.name()
        );
        Ok(asset)
    }

    fn read_bytes(&self, id: &AssetId) -> Result<Vec<u8>, AssetError> {
        let sources: Vec<Arc<dyn AssetSource>> = self.sources.read().clone();
        for source in sources {
            if let Some(bytes) = source.read(id)? {
                return Ok(bytes);
            }
        }
        Err(AssetError::NotFound {
            id: id.clone(),
            detail: "no source contains this identity".to_string(),
        })
    }
}

impl Default for AssetServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssetServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetServer")
            .field("loaders", &self.loaders.read().len())
            .field("sources", &self.sources.read().len())
            .field("slots", &self.slots.lock().len())
            .field("loads", &self.load_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemorySource, TypedLoader};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct Text(String);
    impl Asset for Text {
        const KIND: &'static str = "text";
        fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
            String::from_utf8(bytes.to_vec())
                .map(Self)
                .map_err(|e| AssetError::InvalidData(e.to_string()))
        }
    }

    #[derive(Debug)]
    struct Numbers;
    impl Asset for Numbers {
        const KIND: &'static str = "numbers";
        fn from_bytes(_: &[u8]) -> Result<Self, AssetError> {
            Ok(Self)
        }
    }

    /// Loader that counts calls and takes a while, to widen race windows
    struct SlowCountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl AssetLoader for SlowCountingLoader {
        fn name(&self) -> &str {
            "slow"
        }

        fn accepts(&self, _: &AssetId) -> bool {
            true
        }

        fn load(&self, id: &AssetId, bytes: &[u8]) -> Result<LoadedAsset, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(LoadedAsset::new(id.clone(), Text::from_bytes(bytes)?))
        }
    }

    /// Loader that holds every load until the test releases it
    struct GatedLoader {
        calls: Arc<AtomicUsize>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl AssetLoader for GatedLoader {
        fn name(&self) -> &str {
            "gated"
        }

        fn accepts(&self, _: &AssetId) -> bool {
            true
        }

        fn load(&self, id: &AssetId, bytes: &[u8]) -> Result<LoadedAsset, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // A dropped sender also releases the load
            let _ = self.gate.lock().recv();
            Ok(LoadedAsset::new(id.clone(), Text::from_bytes(bytes)?))
        }
    }

    fn gated_server(calls: &Arc<AtomicUsize>) -> (AssetServer, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel();
        let server = AssetServer::new();
        server.register_loader(GatedLoader {
            calls: Arc::clone(calls),
            gate: Mutex::new(gate),
        });
        server.add_source(Arc::new(MemorySource::new().with("shared.txt", b"x".to_vec())));
        (server, release)
    }

    fn wait_for_state(server: &AssetServer, id: &AssetId, expected: LoadState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while server.load_state(id) != expected {
            assert!(Instant::now() < deadline, "{id} never reached {expected:?}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn server_with_text() -> AssetServer {
        let server = AssetServer::new();
        server.register_loader(TypedLoader::<Text>::new(&["txt"]));
        server.add_source(Arc::new(
            MemorySource::new()
                .with("greeting.txt", b"hello".to_vec())
                .with("numbers.txt", b"1 2 3".to_vec()),
        ));
        server
    }

    #[test]
    fn test_same_identity_shares_instance() {
        let server = server_with_text();
        let id = AssetId::new("greeting.txt");

        let first = server.resolve(&id).unwrap();
        let second = server.resolve(&id).unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(server.load_count(), 1);
        assert_eq!(server.resolve_as::<Text>(&id).unwrap().0, "hello");
    }

    #[test]
    fn test_concurrent_resolves_collapse_to_one_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let server = AssetServer::new();
        server.register_loader(SlowCountingLoader { calls: Arc::clone(&calls) });
        server.add_source(Arc::new(MemorySource::new().with("shared.txt", b"x".to_vec())));

        let id = AssetId::new("shared.txt");
        let results: Vec<LoadedAsset> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| server.resolve(&id).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|pair| pair[0].ptr_eq(&pair[1])));
        assert_eq!(server.load_state(&id), LoadState::Loaded);
    }

    #[test]
    fn test_missing_loader_and_missing_bytes_are_not_found() {
        let server = server_with_text();

        let no_loader = server.resolve(&AssetId::new("music/theme.ogg"));
        assert!(matches!(no_loader, Err(AssetError::NotFound { .. })));

        let no_bytes = server.resolve(&AssetId::new("absent.txt"));
        assert!(matches!(no_bytes, Err(AssetError::NotFound { .. })));
        assert_eq!(server.load_state(&AssetId::new("absent.txt")), LoadState::Failed);
        assert_eq!(server.load_count(), 0);
    }

    #[test]
    fn test_wrong_static_type_is_a_mismatch() {
        let server = server_with_text();
        let result = server.resolve_as::<Numbers>(&AssetId::new("numbers.txt"));
        assert!(matches!(
            result,
            Err(AssetError::TypeMismatch { expected: "numbers", found: "text", .. })
        ));
    }

    #[test]
    fn test_failed_load_is_retried_on_next_request() {
        let source = Arc::new(MemorySource::new());
        let server = AssetServer::new();
        server.register_loader(TypedLoader::<Text>::new(&["txt"]));
        server.add_source(source.clone());

        let id = AssetId::new("late.txt");
        assert!(server.resolve(&id).is_err());

        source.insert("late.txt", b"now here".to_vec());
        assert_eq!(server.resolve_as::<Text>(&id).unwrap().0, "now here");
    }

    #[test]
    fn test_evict_forces_fresh_instance() {
        let server = server_with_text();
        let id = AssetId::new("greeting.txt");

        let before = server.resolve(&id).unwrap();
        assert!(server.evict(&id));
        assert_eq!(server.load_state(&id), LoadState::Unrequested);
        assert!(server.try_get(&id).is_none());

        let after = server.resolve(&id).unwrap();
        assert!(!before.ptr_eq(&after));
        assert_eq!(server.load_count(), 2);
    }

    #[test]
    fn test_evict_during_load_keeps_single_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (server, release) = gated_server(&calls);
        let id = AssetId::new("shared.txt");

        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(|| server.resolve(&id).unwrap());
            wait_for_state(&server, &id, LoadState::Loading);

            assert!(!server.evict(&id));
            server.clear();
            assert_eq!(server.load_state(&id), LoadState::Loading);

            let second = scope.spawn(|| server.resolve(&id).unwrap());
            std::thread::sleep(Duration::from_millis(20));
            release.send(()).unwrap();
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(first.ptr_eq(&second));
        assert!(server.evict(&id));
    }

    #[test]
    fn test_request_loads_without_blocking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (server, release) = gated_server(&calls);
        let server = Arc::new(server);
        let id = AssetId::new("shared.txt");

        assert_eq!(server.request(&id).unwrap(), LoadState::Loading);
        assert_eq!(server.request(&id).unwrap(), LoadState::Loading);
        assert_eq!(server.load_state(&id), LoadState::Loading);
        assert!(server.try_get(&id).is_none());

        release.send(()).unwrap();
        wait_for_state(&server, &id, LoadState::Loaded);

        let loaded = server.try_get(&id).unwrap();
        assert!(loaded.ptr_eq(&server.resolve(&id).unwrap()));
        assert_eq!(server.request(&id).unwrap(), LoadState::Loaded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_request_reports_failure() {
        let server = Arc::new(server_with_text());
        let id = AssetId::new("absent.txt");

        server.request(&id).unwrap();
        wait_for_state(&server, &id, LoadState::Failed);
        assert!(server.try_get(&id).is_none());
    }

    #[test]
    fn test_loader_names_are_unique() {
        let server = server_with_text();
        assert!(!server.register_loader(TypedLoader::<Text>::new(&["md"])));
        assert_eq!(server.loader_count(), 1);
        assert!(server.resolve(&AssetId::new("notes.md")).is_err());
    }
}
