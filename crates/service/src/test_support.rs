#![cfg(test)]
use std::sync::Arc;

use migration::Migrator;
use store::{LocalStore, MemoryBackend};

use crate::auth::{domain::{LoginInput, RegisterInput}, AuthService};
use crate::locations::LocationService;
use crate::session::Session;

pub const PASSWORD: &str = "Abcdef1234@#";

/// Fresh in-memory store at the latest version with the default locations.
pub async fn seeded_store() -> Result<LocalStore, anyhow::Error> {
    let store = LocalStore::open(Arc::new(MemoryBackend::new()), "test-db", Migrator::latest_version(), &Migrator).await?;
    LocationService::new(store.clone()).seed_defaults().await?;
    Ok(store)
}

pub fn register_input(email: &str, name: &str) -> RegisterInput {
    RegisterInput {
        email: email.into(),
        full_name: name.into(),
        password: PASSWORD.into(),
        country: "España".into(),
        city: "Madrid".into(),
        street: "Gran Vía".into(),
        phone: "600111222".into(),
    }
}

/// Register a member and log in.
pub async fn member(store: &LocalStore, email: &str) -> Result<Session, anyhow::Error> {
    let auth = AuthService::new(store.clone());
    auth.register(register_input(email, "Member")).await?;
    Ok(auth.login(LoginInput { email: email.into(), password: PASSWORD.into() }).await?)
}
