use std::collections::BTreeMap;

use tracing::info;

use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::schema::{CollectionSchema, IndexSchema};

/// Callback run by `open` when the requested version is newer than the
/// stored one. It runs at most once per open, before the handle exists.
pub trait Upgrade: Send + Sync {
    fn upgrade(&self, change: &mut VersionChange) -> StoreResult<()>;
}

impl<F> Upgrade for F
where
    F: Fn(&mut VersionChange) -> StoreResult<()> + Send + Sync,
{
    fn upgrade(&self, change: &mut VersionChange) -> StoreResult<()> {
        self(change)
    }
}

/// Structural view of the database during a version transition.
///
/// Only additive changes are possible: collections and indexes can be
/// created, never dropped or altered, and existing records are kept.
pub struct VersionChange {
    old_version: u32,
    new_version: u32,
    collections: BTreeMap<String, Collection>,
}

impl VersionChange {
    pub(crate) fn new(old_version: u32, new_version: u32, collections: BTreeMap<String, Collection>) -> Self {
        Self { old_version, new_version, collections }
    }

    pub(crate) fn into_collections(self) -> BTreeMap<String, Collection> {
        self.collections
    }

    /// Version found on disk; 0 when the database did not exist.
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn has_index(&self, collection: &str, index: &str) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|c| c.schema().indexes.contains_key(index))
    }

    pub fn record_count(&self, collection: &str) -> Option<usize> {
        self.collections.get(collection).map(Collection::len)
    }

    /// Create `name` if missing, then make sure every index in `schema`
    /// exists. Returns `true` only when the collection itself was created.
    pub fn create_collection(&mut self, name: &str, schema: CollectionSchema) -> StoreResult<bool> {
        if let Some(existing) = self.collections.get(name) {
            if !existing.schema().same_identity(&schema) {
                return Err(StoreError::SchemaConflict(format!(
                    "collection `{name}` already exists with a different key path"
                )));
            }
            for (index_name, index) in schema.indexes {
                self.create_index(name, &index_name, index)?;
            }
            return Ok(false);
        }
        info!(collection = name, key_path = %schema.key_path, "creating collection");
        self.collections.insert(name.to_string(), Collection::new(name, schema));
        Ok(true)
    }

    /// Create an index if missing, building it over existing records.
    pub fn create_index(&mut self, collection: &str, name: &str, index: IndexSchema) -> StoreResult<bool> {
        let target = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        let created = target.create_index(name, index)?;
        if created {
            info!(collection, index = name, "creating index");
        }
        Ok(created)
    }
}
