//! Auth module: registration input rules, password hashing and the
//! register/login workflows over the `users` and `locations` collections.

pub mod domain;
pub mod password;
pub mod service;

pub use service::AuthService;
