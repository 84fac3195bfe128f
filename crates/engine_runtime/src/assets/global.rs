//! Process-wide asset server
//!
//! The engine installs one server at startup and tears it down at shutdown.
//! Until then, [`installed`] returns `None` and global resolution fails with
//! [`AssetError::NoGlobalServer`](super::AssetError::NoGlobalServer).

use super::AssetServer;
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_SERVER: RwLock<Option<Arc<AssetServer>>> = parking_lot::const_rwlock(None);

/// Install `server` as the process-wide asset server
///
/// Returns the previously installed server, if any.
pub fn install(server: Arc<AssetServer>) -> Option<Arc<AssetServer>> {
    log::info!("Installing process-wide asset server");
    GLOBAL_SERVER.write().replace(server)
}

/// The installed server
pub fn installed() -> Option<Arc<AssetServer>> {
    GLOBAL_SERVER.read().clone()
}

/// Uninstall the server and release its cached assets
pub fn teardown() -> Option<Arc<AssetServer>> {
    let server = GLOBAL_SERVER.write().take();
    if let Some(server) = &server {
        server.clear();
        log::info!("Process-wide asset server torn down");
    }
    server
}
