use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError,
    },
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::backend::StorageBackend;
use crate::claim::Claim;
use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::image;
use crate::key::Key;
use crate::schema::CollectionSchema;
use crate::transaction::{Transaction, TransactionMode};
use crate::upgrade::{Upgrade, VersionChange};

pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) version: u32,
    pub(crate) backend: Arc<dyn StorageBackend>,
    /// Live state per collection. The set of collections is fixed once the
    /// store is open; only upgrades change it.
    pub(crate) collections: BTreeMap<String, Arc<RwLock<Arc<Collection>>>>,
    /// Last persisted state of every collection. Commits serialize on it.
    pub(crate) committed: Mutex<BTreeMap<String, Arc<Collection>>>,
    closed: AtomicBool,
    claim: std::sync::Mutex<Option<Claim>>,
}

impl Inner {
    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

/// Handle to an open, versioned database. Cheap to clone; every clone
/// refers to the same collections.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .field("backend", &self.inner.backend)
            .finish()
    }
}

impl LocalStore {
    /// Open or create `name` at `version`.
    ///
    /// When `version` is newer than the stored version the upgrade runs
    /// once and the upgraded image is persisted before the handle is
    /// returned. A failed upgrade leaves the stored image untouched.
    ///
    /// Only one handle per image may be open in a process at a time; a
    /// second open is `AlreadyOpen` (or `VersionChangeBlocked` when it asks
    /// for a newer version) until the first is closed or dropped. Use
    /// [`StoreRegistry`](crate::StoreRegistry) to share one handle.
    #[instrument(skip(backend, upgrade), fields(store = %name))]
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        name: &str,
        version: u32,
        upgrade: &dyn Upgrade,
    ) -> StoreResult<Self> {
        if version == 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        backend.acquire().await?;

        let location = backend.locate(name).await?;
        let claim = match Claim::take(location, version) {
            Ok(claim) => claim,
            Err(held) => {
                let stored = match backend.read(name).await? {
                    Some(bytes) => image::decode(name, &bytes)?.0,
                    None => 0,
                };
                return Err(if version < stored {
                    StoreError::VersionMismatch { requested: version, stored }
                } else if version > held {
                    StoreError::VersionChangeBlocked(name.to_string())
                } else {
                    StoreError::AlreadyOpen(name.to_string())
                });
            }
        };

        let (stored_version, collections) = match backend.read(name).await? {
            Some(bytes) => image::decode(name, &bytes)?,
            None => (0, BTreeMap::new()),
        };
        if version < stored_version {
            return Err(StoreError::VersionMismatch { requested: version, stored: stored_version });
        }

        let collections: BTreeMap<String, Arc<Collection>> = if version > stored_version {
            let mut change = VersionChange::new(stored_version, version, collections);
            if let Err(e) = upgrade.upgrade(&mut change) {
                warn!(from = stored_version, to = version, error = %e, "upgrade aborted");
                return Err(StoreError::UpgradeFailed { version, reason: e.to_string() });
            }
            let upgraded = shared(change.into_collections());
            let bytes = image::encode(name, version, &upgraded)?;
            backend
                .write(name, bytes)
                .await
                .map_err(|e| StoreError::StorageUnavailable(format!("cannot persist upgrade: {e}")))?;
            info!(from = stored_version, to = version, "store upgraded");
            upgraded
        } else {
            shared(collections)
        };

        let live = collections
            .iter()
            .map(|(n, c)| (n.clone(), Arc::new(RwLock::new(Arc::clone(c)))))
            .collect();
        info!(version, collections = collections.len(), "store opened");

        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                version,
                backend,
                collections: live,
                committed: Mutex::new(collections),
                closed: AtomicBool::new(false),
                claim: std::sync::Mutex::new(Some(claim)),
            }),
        })
    }

    /// Close this handle and every clone of it.
    ///
    /// Waits for an in-flight commit, then makes new transactions and
    /// pending commits fail with `Closed` and frees the image for the next
    /// open. Returns `false` if the handle was already closed.
    pub async fn close(&self) -> bool {
        let _commits = self.inner.committed.lock().await;
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let claim = self.inner.claim.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(claim);
        info!(store = %self.inner.name, version = self.inner.version, "store closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.inner.collections.keys().map(String::as_str).collect()
    }

    pub async fn schema(&self, collection: &str) -> StoreResult<CollectionSchema> {
        let lock = self
            .inner
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(lock.read().await.schema().clone())
    }

    /// Begin a transaction over `scope`.
    ///
    /// Waits until every collection in the scope is free: read-only
    /// transactions share access, read-write transactions are exclusive.
    /// Locks are taken in name order so overlapping scopes cannot deadlock.
    pub async fn transaction(&self, scope: &[&str], mode: TransactionMode) -> StoreResult<Transaction> {
        self.inner.ensure_open()?;
        if scope.is_empty() {
            return Err(StoreError::InvalidScope("a transaction needs at least one collection".into()));
        }
        let mut names: Vec<&str> = scope.to_vec();
        names.sort_unstable();
        names.dedup();

        let mut locks = Vec::with_capacity(names.len());
        for name in names {
            let lock = self
                .inner
                .collections
                .get(name)
                .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?;
            locks.push((name.to_string(), Arc::clone(lock)));
        }

        let mut tx = Transaction::new(Arc::clone(&self.inner), mode);
        for (name, lock) in locks {
            tx.bind(name, lock).await;
        }
        Ok(tx)
    }

    pub async fn get<T: DeserializeOwned>(&self, collection: &str, key: impl Into<Key>) -> StoreResult<Option<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        tx.get(collection, key)
    }

    pub async fn get_all<T: DeserializeOwned>(&self, collection: &str) -> StoreResult<Vec<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        tx.get_all(collection)
    }

    pub async fn get_all_filtered<T, F>(&self, collection: &str, predicate: F) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        tx.get_all_filtered(collection, predicate)
    }

    pub async fn get_all_by_index<T: DeserializeOwned>(
        &self,
        collection: &str,
        index: &str,
        value: impl Into<Key>,
    ) -> StoreResult<Vec<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        tx.get_all_by_index(collection, index, value)
    }

    pub async fn count(&self, collection: &str) -> StoreResult<usize> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        tx.count(collection)
    }

    pub async fn put<T: Serialize>(&self, collection: &str, record: &T) -> StoreResult<Key> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let key = tx.put(collection, record)?;
        tx.commit().await?;
        Ok(key)
    }

    pub async fn add<T: Serialize>(&self, collection: &str, record: &T) -> StoreResult<Key> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let key = tx.add(collection, record)?;
        tx.commit().await?;
        Ok(key)
    }

    pub async fn delete(&self, collection: &str, key: impl Into<Key>) -> StoreResult<bool> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let removed = tx.delete(collection, key)?;
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn iterate_and_delete<T, F>(&self, collection: &str, predicate: F) -> StoreResult<usize>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let removed = tx.iterate_and_delete(collection, predicate)?;
        tx.commit().await?;
        Ok(removed)
    }
}

fn shared(collections: BTreeMap<String, Collection>) -> BTreeMap<String, Arc<Collection>> {
    collections.into_iter().map(|(n, c)| (n, Arc::new(c))).collect()
}
