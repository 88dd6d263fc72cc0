use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::key::{assign, lookup, Key};
use crate::schema::{CollectionSchema, IndexSchema};

/// Index value -> primary keys carrying that value.
type IndexEntries = BTreeMap<Key, BTreeSet<Key>>;

/// In-memory state of one collection. Indexes are derived data and are
/// rebuilt on load rather than persisted.
#[derive(Clone, Debug)]
pub(crate) struct Collection {
    name: String,
    schema: CollectionSchema,
    next_key: i64,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexEntries>,
}

/// Persisted form of a collection inside a database image.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredCollection {
    pub schema: CollectionSchema,
    pub next_key: i64,
    #[serde(default)]
    pub records: Vec<Value>,
}

/// Borrowed view used when writing an image, so commits never clone
/// record payloads.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionView<'a> {
    schema: &'a CollectionSchema,
    next_key: i64,
    records: Vec<&'a Value>,
}

impl Collection {
    pub(crate) fn new(name: &str, schema: CollectionSchema) -> Self {
        let indexes = schema.indexes.keys().map(|n| (n.clone(), IndexEntries::new())).collect();
        Self { name: name.to_string(), schema, next_key: 1, records: BTreeMap::new(), indexes }
    }

    pub(crate) fn from_stored(name: &str, stored: StoredCollection) -> StoreResult<Self> {
        let mut collection = Collection::new(name, stored.schema);
        for record in stored.records {
            collection.insert(record, false)?;
        }
        collection.next_key = collection.next_key.max(stored.next_key);
        Ok(collection)
    }

    pub(crate) fn view(&self) -> CollectionView<'_> {
        CollectionView { schema: &self.schema, next_key: self.next_key, records: self.records.values().collect() }
    }

    pub(crate) fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn get(&self, key: &Key) -> Option<&Value> {
        self.records.get(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.records.keys()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.records.values()
    }

    /// Primary keys whose record has `value` at the index key path, in
    /// primary-key order.
    pub(crate) fn index_lookup(&self, index: &str, value: &Key) -> StoreResult<Vec<&Value>> {
        let entries = self.indexes.get(index).ok_or_else(|| StoreError::UnknownIndex {
            collection: self.name.clone(),
            index: index.to_string(),
        })?;
        Ok(entries
            .get(value)
            .into_iter()
            .flatten()
            .filter_map(|key| self.records.get(key))
            .collect())
    }

    /// Insert or replace a record. With `overwrite == false` an existing
    /// key is a `DuplicateKey` error.
    pub(crate) fn insert(&mut self, mut record: Value, overwrite: bool) -> StoreResult<Key> {
        if !record.is_object() {
            return Err(StoreError::invalid_record(&self.name, "record must be a JSON object"));
        }

        let key = match lookup(&record, &self.schema.key_path).filter(|v| !v.is_null()) {
            Some(value) => self.primary_key(value)?,
            None if self.schema.auto_increment => {
                let key = Key::Int(self.next_key);
                if !assign(&mut record, &self.schema.key_path, key.to_value()) {
                    return Err(StoreError::invalid_key(&self.name, "cannot write generated key into record"));
                }
                key
            }
            None => {
                return Err(StoreError::invalid_key(
                    &self.name,
                    format!("record has no value at key path `{}`", self.schema.key_path),
                ))
            }
        };

        if !overwrite && self.records.contains_key(&key) {
            return Err(StoreError::DuplicateKey { collection: self.name.clone(), key: key.to_string() });
        }
        self.check_unique(&key, &record)?;

        if let Key::Int(n) = key {
            if self.schema.auto_increment && n >= self.next_key {
                self.next_key = n
                    .checked_add(1)
                    .ok_or_else(|| StoreError::invalid_key(&self.name, format!("key {n} exhausts the key generator")))?;
            }
        }
        if let Some(previous) = self.records.remove(&key) {
            self.unindex(&key, &previous);
        }
        self.index(&key, &record);
        self.records.insert(key.clone(), record);
        Ok(key)
    }

    pub(crate) fn delete(&mut self, key: &Key) -> bool {
        match self.records.remove(key) {
            Some(previous) => {
                self.unindex(key, &previous);
                true
            }
            None => false,
        }
    }

    /// Add an index and build it over the existing records. Returns
    /// `false` if an identical index already exists.
    pub(crate) fn create_index(&mut self, name: &str, index: IndexSchema) -> StoreResult<bool> {
        if let Some(existing) = self.schema.indexes.get(name) {
            if *existing == index {
                return Ok(false);
            }
            return Err(StoreError::SchemaConflict(format!(
                "index `{name}` on `{}` already exists with a different definition",
                self.name
            )));
        }

        let mut entries = IndexEntries::new();
        for (key, record) in &self.records {
            if let Some(value) = index_value(record, &index) {
                let keys = entries.entry(value).or_default();
                if index.unique && !keys.is_empty() {
                    return Err(StoreError::SchemaConflict(format!(
                        "existing records in `{}` violate unique index `{name}`",
                        self.name
                    )));
                }
                keys.insert(key.clone());
            }
        }
        self.schema.indexes.insert(name.to_string(), index);
        self.indexes.insert(name.to_string(), entries);
        Ok(true)
    }

    fn primary_key(&self, value: &Value) -> StoreResult<Key> {
        match Key::from_value(value) {
            Some(key) if key.is_valid_primary() => Ok(key),
            _ => Err(StoreError::invalid_key(&self.name, format!("`{value}` is not a valid primary key"))),
        }
    }

    fn check_unique(&self, key: &Key, record: &Value) -> StoreResult<()> {
        for (name, index) in self.schema.indexes.iter().filter(|(_, i)| i.unique) {
            let Some(value) = index_value(record, index) else { continue };
            let taken = self
                .indexes
                .get(name)
                .and_then(|entries| entries.get(&value))
                .is_some_and(|keys| keys.iter().any(|k| k != key));
            if taken {
                return Err(StoreError::DuplicateKey {
                    collection: self.name.clone(),
                    key: format!("{name}={value}"),
                });
            }
        }
        Ok(())
    }

    fn index(&mut self, key: &Key, record: &Value) {
        for (name, index) in &self.schema.indexes {
            if let Some(value) = index_value(record, index) {
                self.indexes.entry(name.clone()).or_default().entry(value).or_default().insert(key.clone());
            }
        }
    }

    fn unindex(&mut self, key: &Key, record: &Value) {
        for (name, index) in &self.schema.indexes {
            let Some(value) = index_value(record, index) else { continue };
            let Some(entries) = self.indexes.get_mut(name) else { continue };
            if let Some(keys) = entries.get_mut(&value) {
                keys.remove(key);
                if keys.is_empty() {
                    entries.remove(&value);
                }
            }
        }
    }
}

fn index_value(record: &Value, index: &IndexSchema) -> Option<Key> {
    lookup(record, &index.key_path).and_then(Key::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media() -> Collection {
        Collection::new(
            "media",
            CollectionSchema::auto_increment("id").with_index("userId", IndexSchema::new("userId")),
        )
    }

    #[test]
    fn auto_increment_assigns_and_writes_back() {
        let mut c = media();
        let k1 = c.insert(json!({"userId": "a@gmail.com"}), false).unwrap();
        let k2 = c.insert(json!({"userId": "b@gmail.com", "id": null}), false).unwrap();
        assert_eq!(k1, Key::Int(1));
        assert_eq!(k2, Key::Int(2));
        assert_eq!(c.get(&k2).unwrap()["id"], json!(2));
    }

    #[test]
    fn explicit_ids_bump_the_counter() {
        let mut c = media();
        c.insert(json!({"id": 10}), false).unwrap();
        let next = c.insert(json!({}), false).unwrap();
        assert_eq!(next, Key::Int(11));
    }

    #[test]
    fn largest_explicit_id_is_rejected_without_side_effects() {
        let mut c = media();
        c.insert(json!({"id": 5}), false).unwrap();
        let err = c.insert(json!({"id": i64::MAX}), true).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert_eq!(c.len(), 1);
        assert_eq!(c.insert(json!({}), false).unwrap(), Key::Int(6));
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let mut c = media();
        let k = c.insert(json!({}), false).unwrap();
        assert!(c.delete(&k));
        assert_eq!(c.insert(json!({}), false).unwrap(), Key::Int(2));
    }

    #[test]
    fn index_follows_updates_and_deletes() {
        let mut c = media();
        let k = c.insert(json!({"userId": "a@gmail.com"}), false).unwrap();
        assert_eq!(c.index_lookup("userId", &Key::from("a@gmail.com")).unwrap().len(), 1);

        c.insert(json!({"id": 1, "userId": "b@gmail.com"}), true).unwrap();
        assert!(c.index_lookup("userId", &Key::from("a@gmail.com")).unwrap().is_empty());
        assert_eq!(c.index_lookup("userId", &Key::from("b@gmail.com")).unwrap().len(), 1);

        c.delete(&k);
        assert!(c.index_lookup("userId", &Key::from("b@gmail.com")).unwrap().is_empty());
        assert!(matches!(c.index_lookup("nope", &Key::Int(1)), Err(StoreError::UnknownIndex { .. })));
    }

    #[test]
    fn add_rejects_duplicates_put_overwrites() {
        let mut c = Collection::new("users", CollectionSchema::keyed("email"));
        c.insert(json!({"email": "a@gmail.com", "n": 1}), false).unwrap();
        let err = c.insert(json!({"email": "a@gmail.com", "n": 2}), false).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        c.insert(json!({"email": "a@gmail.com", "n": 3}), true).unwrap();
        assert_eq!(c.get(&Key::from("a@gmail.com")).unwrap()["n"], json!(3));
    }

    #[test]
    fn missing_or_invalid_keys_are_rejected() {
        let mut c = Collection::new("users", CollectionSchema::keyed("email"));
        assert!(matches!(c.insert(json!({"name": "x"}), false), Err(StoreError::InvalidKey { .. })));
        assert!(matches!(c.insert(json!({"email": true}), false), Err(StoreError::InvalidKey { .. })));
        assert!(matches!(c.insert(json!([1, 2]), false), Err(StoreError::InvalidRecord { .. })));
    }

    #[test]
    fn unique_index_blocks_conflicts_but_allows_self_update() {
        let mut c = Collection::new(
            "users",
            CollectionSchema::keyed("email").with_index("phone", IndexSchema::new("phone").unique()),
        );
        c.insert(json!({"email": "a@gmail.com", "phone": "+34 1"}), false).unwrap();
        c.insert(json!({"email": "a@gmail.com", "phone": "+34 1", "x": 1}), true).unwrap();
        let err = c.insert(json!({"email": "b@gmail.com", "phone": "+34 1"}), false).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[test]
    fn create_index_is_idempotent_and_builds_over_existing_records() {
        let mut c = Collection::new("media", CollectionSchema::auto_increment("id"));
        c.insert(json!({"visibility": "public"}), false).unwrap();
        c.insert(json!({"visibility": "private"}), false).unwrap();

        assert!(c.create_index("visibility", IndexSchema::new("visibility")).unwrap());
        assert!(!c.create_index("visibility", IndexSchema::new("visibility")).unwrap());
        assert_eq!(c.index_lookup("visibility", &Key::from("public")).unwrap().len(), 1);

        let conflict = c.create_index("visibility", IndexSchema::new("other"));
        assert!(matches!(conflict, Err(StoreError::SchemaConflict(_))));
    }

    #[test]
    fn stored_round_trip_keeps_counter() {
        let mut c = media();
        for _ in 0..3 {
            c.insert(json!({}), false).unwrap();
        }
        c.delete(&Key::Int(3));
        let json = serde_json::to_value(c.view()).unwrap();
        let stored: StoredCollection = serde_json::from_value(json).unwrap();
        let restored = Collection::from_stored("media", stored).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.next_key, 4);
    }
}
