//! Record types persisted in the store, with the field rules they must
//! satisfy before any write.

pub mod errors;
pub mod location;
pub mod media;
pub mod user;

pub use errors::ModelError;
pub use location::Location;
pub use media::{Comment, Media, MediaPayload, Reaction, Visibility};
pub use user::{Address, Role, User};
