//! Process-level helpers shared by the binary and the services.

pub mod env;
pub mod utils;
