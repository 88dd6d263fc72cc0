use thiserror::Error;

/// Errors raised by the local store.
///
/// `DuplicateKey` is the only recoverable condition; everything else is
/// terminal for the operation that produced it. Missing records are not
/// errors at all and come back as `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage fault: {0}")]
    StorageFault(String),
    #[error("duplicate key {key} in `{collection}`")]
    DuplicateKey { collection: String, key: String },
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),
    #[error("unknown index `{index}` on `{collection}`")]
    UnknownIndex { collection: String, index: String },
    #[error("collection `{0}` is not part of this transaction")]
    NotInScope(String),
    #[error("invalid transaction scope: {0}")]
    InvalidScope(String),
    #[error("read-only transaction cannot write to `{0}`")]
    ReadOnly(String),
    #[error("invalid key for `{collection}`: {reason}")]
    InvalidKey { collection: String, reason: String },
    #[error("invalid record for `{collection}`: {reason}")]
    InvalidRecord { collection: String, reason: String },
    #[error("invalid version {0}; versions start at 1")]
    InvalidVersion(u32),
    #[error("requested version {requested} is lower than stored version {stored}")]
    VersionMismatch { requested: u32, stored: u32 },
    #[error("store `{0}` is already open; close it before changing its version")]
    VersionChangeBlocked(String),
    #[error("store `{0}` is already open in this process; share the handle through a registry")]
    AlreadyOpen(String),
    #[error("store `{0}` has been closed")]
    Closed(String),
    #[error("schema conflict: {0}")]
    SchemaConflict(String),
    #[error("upgrade to version {version} failed: {reason}")]
    UpgradeFailed { version: u32, reason: String },
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

impl StoreError {
    /// Expected conditions callers are supposed to handle in place.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }

    pub(crate) fn invalid_record(collection: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord { collection: collection.to_string(), reason: reason.into() }
    }

    pub(crate) fn invalid_key(collection: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey { collection: collection.to_string(), reason: reason.into() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_duplicate_key_is_recoverable() {
        let dup = StoreError::DuplicateKey { collection: "users".into(), key: "\"a@gmail.com\"".into() };
        assert!(dup.is_recoverable());
        assert!(!StoreError::StorageFault("disk full".into()).is_recoverable());
        assert!(!StoreError::StorageUnavailable("no dir".into()).is_recoverable());
    }

    #[test]
    fn messages_name_the_collection() {
        let e = StoreError::NotInScope("media".into());
        assert_eq!(e.to_string(), "collection `media` is not part of this transaction");
    }
}
