use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::StorageBackend;
use crate::database::LocalStore;
use crate::error::{StoreError, StoreResult};
use crate::upgrade::Upgrade;

/// Process-wide table of open databases over one backend.
///
/// Opens are serialized, so concurrent callers asking for the same
/// database at the same version share one handle and the upgrade runs
/// once. Asking for a newer version while a handle is still open is
/// `VersionChangeBlocked` until that handle is closed.
#[derive(Debug)]
pub struct StoreRegistry {
    backend: Arc<dyn StorageBackend>,
    open: Mutex<HashMap<String, LocalStore>>,
}

impl StoreRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend, open: Mutex::new(HashMap::new()) }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub async fn open(&self, name: &str, version: u32, upgrade: &dyn Upgrade) -> StoreResult<LocalStore> {
        let mut open = self.open.lock().await;
        if let Some(existing) = open.get(name) {
            if existing.is_closed() {
                debug!(store = name, "dropping closed handle");
                open.remove(name);
            } else {
                return match version.cmp(&existing.version()) {
                    std::cmp::Ordering::Equal => {
                        debug!(store = name, version, "reusing open handle");
                        Ok(existing.clone())
                    }
                    std::cmp::Ordering::Less => {
                        Err(StoreError::VersionMismatch { requested: version, stored: existing.version() })
                    }
                    std::cmp::Ordering::Greater => Err(StoreError::VersionChangeBlocked(name.to_string())),
                };
            }
        }
        let store = LocalStore::open(Arc::clone(&self.backend), name, version, upgrade).await?;
        open.insert(name.to_string(), store.clone());
        Ok(store)
    }

    /// Close the shared handle. Clones held elsewhere are closed with it
    /// and fail with `Closed` from then on.
    pub async fn close(&self, name: &str) -> bool {
        let Some(store) = self.open.lock().await.remove(name) else {
            return false;
        };
        store.close().await
    }

    pub async fn is_open(&self, name: &str) -> bool {
        self.open.lock().await.get(name).is_some_and(|s| !s.is_closed())
    }
}
