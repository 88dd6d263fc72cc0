//! Schema-versioned, transactional record store.
//!
//! A [`LocalStore`] holds named collections of JSON records, each with a
//! primary key path, optional auto-increment ids and secondary indexes.
//! The schema only ever grows through [`Upgrade`] callbacks run at open.
//! Every read and write happens inside a [`Transaction`] that is applied
//! all-or-nothing.

pub mod backend;
mod claim;
mod collection;
pub mod database;
pub mod error;
mod image;
pub mod key;
pub mod registry;
pub mod schema;
pub mod transaction;
pub mod upgrade;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use database::LocalStore;
pub use error::{StoreError, StoreResult};
pub use key::Key;
pub use registry::StoreRegistry;
pub use schema::{CollectionSchema, IndexSchema};
pub use transaction::{Transaction, TransactionMode};
pub use upgrade::{Upgrade, VersionChange};
