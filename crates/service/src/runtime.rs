//! Store bootstrap
//!
//! Builds the configured backend and opens the store at the latest
//! schema version through a registry.

use std::sync::Arc;

use configs::{StoreConfig, StoreEngine};
use migration::Migrator;
use store::{FileBackend, LocalStore, MemoryBackend, StorageBackend, StoreRegistry};
use tracing::{info, warn};

use crate::errors::ServiceResult;

pub fn backend_for(cfg: &StoreConfig) -> Arc<dyn StorageBackend> {
    match cfg.engine {
        StoreEngine::File => Arc::new(FileBackend::new(&cfg.data_dir)),
        StoreEngine::Memory => {
            warn!("memory store engine selected; data will not survive the process");
            Arc::new(MemoryBackend::new())
        }
    }
}

pub fn registry_for(cfg: &StoreConfig) -> StoreRegistry {
    StoreRegistry::new(backend_for(cfg))
}

/// Open `cfg.name` at the newest schema version, upgrading if needed.
pub async fn open_store(registry: &StoreRegistry, cfg: &StoreConfig) -> ServiceResult<LocalStore> {
    let version = Migrator::latest_version();
    let store = registry.open(&cfg.name, version, &Migrator).await?;
    info!(store = %cfg.name, version, engine = ?cfg.engine, "store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_engine_opens_at_latest_version() -> Result<(), anyhow::Error> {
        let cfg = StoreConfig { engine: StoreEngine::Memory, ..StoreConfig::default() };
        let registry = registry_for(&cfg);
        let store = open_store(&registry, &cfg).await?;
        assert_eq!(store.version(), Migrator::latest_version());
        assert_eq!(store.name(), "mypub-db");

        let again = open_store(&registry, &cfg).await?;
        assert_eq!(again.version(), store.version());
        Ok(())
    }
}
