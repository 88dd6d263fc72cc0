use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::database::Inner;
use crate::error::{StoreError, StoreResult};
use crate::image;
use crate::key::Key;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

enum ScopeGuard {
    Read(OwnedRwLockReadGuard<Arc<Collection>>),
    Write(OwnedRwLockWriteGuard<Arc<Collection>>),
}

impl ScopeGuard {
    fn current(&self) -> &Collection {
        match self {
            ScopeGuard::Read(g) => g,
            ScopeGuard::Write(g) => g,
        }
    }
}

/// All-or-nothing unit of work bound to a fixed set of collections.
///
/// Operations run immediately, in call order, against a private working
/// copy of each written collection. The first failing operation poisons
/// the transaction: later operations and `commit` report
/// `TransactionAborted` and nothing is applied. Dropping a transaction
/// without committing rolls it back.
pub struct Transaction {
    store: Arc<Inner>,
    mode: TransactionMode,
    scope: BTreeMap<String, ScopeGuard>,
    working: BTreeMap<String, Collection>,
    failure: Option<String>,
}

impl Transaction {
    pub(crate) fn new(store: Arc<Inner>, mode: TransactionMode) -> Self {
        Self { store, mode, scope: BTreeMap::new(), working: BTreeMap::new(), failure: None }
    }

    pub(crate) async fn bind(&mut self, name: String, lock: Arc<RwLock<Arc<Collection>>>) {
        let guard = match self.mode {
            TransactionMode::ReadOnly => ScopeGuard::Read(lock.read_owned().await),
            TransactionMode::ReadWrite => ScopeGuard::Write(lock.write_owned().await),
        };
        self.scope.insert(name, guard);
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn is_aborted(&self) -> bool {
        self.failure.is_some()
    }

    pub fn get<T: DeserializeOwned>(&mut self, collection: &str, key: impl Into<Key>) -> StoreResult<Option<T>> {
        let key = key.into();
        let result = self.live().and_then(|_| {
            self.read(collection)?
                .get(&key)
                .map(|value| decode(collection, value))
                .transpose()
        });
        self.track(result)
    }

    /// Snapshot of every record in key order.
    pub fn get_all<T: DeserializeOwned>(&mut self, collection: &str) -> StoreResult<Vec<T>> {
        self.get_all_filtered(collection, |_: &T| true)
    }

    pub fn get_all_filtered<T, F>(&mut self, collection: &str, mut predicate: F) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let result = self.live().and_then(|_| {
            let mut out = Vec::new();
            for value in self.read(collection)?.values() {
                let record: T = decode(collection, value)?;
                if predicate(&record) {
                    out.push(record);
                }
            }
            Ok(out)
        });
        self.track(result)
    }

    /// Records whose `index` value equals `value`, in primary-key order.
    pub fn get_all_by_index<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        index: &str,
        value: impl Into<Key>,
    ) -> StoreResult<Vec<T>> {
        let value = value.into();
        let result = self.live().and_then(|_| {
            self.read(collection)?
                .index_lookup(index, &value)?
                .into_iter()
                .map(|v| decode(collection, v))
                .collect::<StoreResult<Vec<T>>>()
        });
        self.track(result)
    }

    pub fn count(&mut self, collection: &str) -> StoreResult<usize> {
        let result = self.live().and_then(|_| Ok(self.read(collection)?.len()));
        self.track(result)
    }

    /// Insert or replace by key path.
    pub fn put<T: Serialize>(&mut self, collection: &str, record: &T) -> StoreResult<Key> {
        let result = self.write_record(collection, record, true);
        self.track(result)
    }

    /// Insert only; an existing key is `DuplicateKey`.
    pub fn add<T: Serialize>(&mut self, collection: &str, record: &T) -> StoreResult<Key> {
        let result = self.write_record(collection, record, false);
        self.track(result)
    }

    /// Remove a record; absent keys are not an error.
    pub fn delete(&mut self, collection: &str, key: impl Into<Key>) -> StoreResult<bool> {
        let key = key.into();
        let result = self.live().and_then(|_| Ok(self.write(collection)?.delete(&key)));
        self.track(result)
    }

    /// Delete every record matching `predicate`.
    ///
    /// The key set is captured before the first deletion, so each record
    /// present at the start is visited exactly once.
    pub fn iterate_and_delete<T, F>(&mut self, collection: &str, predicate: F) -> StoreResult<usize>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let result = self.live().and_then(|_| self.scan_delete(collection, predicate));
        self.track(result)
    }

    /// Persist every written collection in one image write, then publish
    /// the new state. A backend failure is a `StorageFault` and leaves
    /// both the stored image and the live state untouched. A store closed
    /// in the meantime rejects the commit with `Closed`.
    pub async fn commit(mut self) -> StoreResult<()> {
        if let Some(reason) = self.failure.take() {
            warn!(store = %self.store.name, %reason, "transaction rolled back");
            self.working.clear();
            return Err(StoreError::TransactionAborted(reason));
        }
        if self.working.is_empty() {
            return Ok(());
        }

        let written: BTreeMap<String, Arc<Collection>> =
            std::mem::take(&mut self.working).into_iter().map(|(n, c)| (n, Arc::new(c))).collect();
        {
            let mut committed = self.store.committed.lock().await;
            self.store.ensure_open()?;
            let mut next = committed.clone();
            next.extend(written.iter().map(|(n, c)| (n.clone(), Arc::clone(c))));
            let bytes = image::encode(&self.store.name, self.store.version, &next)?;
            self.store.backend.write(&self.store.name, bytes).await?;
            *committed = next;
        }

        let names: Vec<&str> = written.keys().map(String::as_str).collect();
        debug!(store = %self.store.name, collections = ?names, "transaction committed");
        for (name, collection) in written {
            if let Some(ScopeGuard::Write(guard)) = self.scope.get_mut(&name) {
                **guard = collection;
            }
        }
        Ok(())
    }

    fn live(&self) -> StoreResult<()> {
        match &self.failure {
            Some(reason) => Err(StoreError::TransactionAborted(reason.clone())),
            None => Ok(()),
        }
    }

    fn track<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            if self.failure.is_none() {
                debug!(store = %self.store.name, error = %e, "transaction poisoned");
                self.failure = Some(e.to_string());
            }
        }
        result
    }

    fn read(&self, collection: &str) -> StoreResult<&Collection> {
        if let Some(working) = self.working.get(collection) {
            return Ok(working);
        }
        self.scope
            .get(collection)
            .map(ScopeGuard::current)
            .ok_or_else(|| StoreError::NotInScope(collection.to_string()))
    }

    fn write(&mut self, collection: &str) -> StoreResult<&mut Collection> {
        let guard = self
            .scope
            .get(collection)
            .ok_or_else(|| StoreError::NotInScope(collection.to_string()))?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(StoreError::ReadOnly(collection.to_string()));
        }
        Ok(match self.working.entry(collection.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(guard.current().clone()),
        })
    }

    fn write_record<T: Serialize>(&mut self, collection: &str, record: &T, overwrite: bool) -> StoreResult<Key> {
        self.live()?;
        let value = serde_json::to_value(record).map_err(|e| StoreError::invalid_record(collection, e.to_string()))?;
        self.write(collection)?.insert(value, overwrite)
    }

    fn scan_delete<T, F>(&mut self, collection: &str, mut predicate: F) -> StoreResult<usize>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let target = self.write(collection)?;
        let keys: Vec<Key> = target.keys().cloned().collect();
        let mut removed = 0;
        for key in keys {
            let Some(value) = target.get(&key) else { continue };
            let record: T = decode(collection, value)?;
            if predicate(&record) && target.delete(&key) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.working.is_empty() {
            debug!(store = %self.store.name, "uncommitted transaction dropped; rolling back");
        }
    }
}

fn decode<T: DeserializeOwned>(collection: &str, value: &Value) -> StoreResult<T> {
    T::deserialize(value).map_err(|e| StoreError::invalid_record(collection, e.to_string()))
}
