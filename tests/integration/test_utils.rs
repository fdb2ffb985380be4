//! Shared test utilities for integration tests

use checkoutfs::config::{CheckoutConfig, StorageConfig};
use checkoutfs::lock::LeaseLockCoordinator;
use checkoutfs::server::Dispatcher;
use checkoutfs::session::ClientSession;
use checkoutfs::store::FileSystemStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Serializes tests that touch process-wide environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub type LocalSession = ClientSession<Arc<Dispatcher>, Arc<LeaseLockCoordinator>>;

/// A store with its blobs under a fresh temp dir.
pub fn temp_store() -> (TempDir, Arc<FileSystemStore>) {
    let dir = TempDir::new().unwrap();
    let store = FileSystemStore::new(dir.path().join("storage")).unwrap();
    (dir, Arc::new(store))
}

/// In-process file service: one store, one lock coordinator, any number of
/// sessions.
pub struct LocalService {
    pub dir: TempDir,
    pub dispatcher: Arc<Dispatcher>,
    pub locks: Arc<LeaseLockCoordinator>,
}

impl LocalService {
    pub fn new() -> Self {
        let (dir, store) = temp_store();
        Self {
            dir,
            dispatcher: Arc::new(Dispatcher::new(store)),
            locks: Arc::new(LeaseLockCoordinator::new(Duration::from_secs(10))),
        }
    }

    pub fn store(&self) -> &Arc<FileSystemStore> {
        self.dispatcher.store()
    }

    pub fn session(&self) -> LocalSession {
        ClientSession::new(Arc::clone(&self.dispatcher), Arc::clone(&self.locks))
    }
}

/// Server configuration on loopback with OS-assigned ports, rooted at `dir`.
pub fn loopback_config(dir: &TempDir) -> CheckoutConfig {
    let mut config = CheckoutConfig::default();
    config.server.port = 0;
    config.server.bulk_port = 0;
    config.lock.port = 0;
    config.lock.lease_ttl_ms = 200;
    config.lock.reap_interval_ms = 20;
    config.storage = StorageConfig::rooted_at(dir.path());
    config
}
