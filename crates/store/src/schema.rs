use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Secondary index definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub key_path: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSchema {
    pub fn new(key_path: impl Into<String>) -> Self {
        Self { key_path: key_path.into(), unique: false }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Collection definition: primary key path, id generation and indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub key_path: String,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSchema>,
}

impl CollectionSchema {
    /// Collection whose records carry their own key at `key_path`.
    pub fn keyed(key_path: impl Into<String>) -> Self {
        Self { key_path: key_path.into(), auto_increment: false, indexes: BTreeMap::new() }
    }

    /// Collection that assigns sequential integer ids at `key_path`.
    pub fn auto_increment(key_path: impl Into<String>) -> Self {
        Self { auto_increment: true, ..Self::keyed(key_path) }
    }

    pub fn with_index(mut self, name: impl Into<String>, index: IndexSchema) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    /// Key path and id generation match; indexes are compared separately.
    pub(crate) fn same_identity(&self, other: &CollectionSchema) -> bool {
        self.key_path == other.key_path && self.auto_increment == other.auto_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let schema = CollectionSchema::auto_increment("id")
            .with_index("userId", IndexSchema::new("userId"))
            .with_index("slug", IndexSchema::new("slug").unique());
        assert!(schema.auto_increment);
        assert_eq!(schema.indexes.len(), 2);
        assert!(schema.indexes["slug"].unique);
        assert!(!schema.indexes["userId"].unique);
    }

    #[test]
    fn identity_ignores_indexes() {
        let a = CollectionSchema::keyed("email");
        let b = CollectionSchema::keyed("email").with_index("fullName", IndexSchema::new("fullName"));
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&CollectionSchema::auto_increment("email")));
    }
}
