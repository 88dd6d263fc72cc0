//! Service layer providing the application's workflows on top of the
//! local store.
//! - Every operation runs inside one store transaction.
//! - Field rules come from the `models` crate and are checked before any write.
//! - Callers pass an explicit `Session`; there is no ambient current user.

pub mod auth;
pub mod errors;
pub mod locations;
pub mod media;
pub mod runtime;
pub mod session;
pub mod user_admin;
#[cfg(test)]
pub mod test_support;

pub use errors::{ServiceError, ServiceResult};
pub use session::Session;
