//! In-process ownership of database images.
//!
//! At most one live [`LocalStore`](crate::LocalStore) per image location.
//! Two independent handles would each build commits from their own state
//! and overwrite each other's records.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use once_cell::sync::Lazy;
use tracing::debug;

static CLAIMS: Lazy<Mutex<HashMap<String, u32>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn claims() -> MutexGuard<'static, HashMap<String, u32>> {
    CLAIMS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by an open store; released on drop.
#[derive(Debug)]
pub(crate) struct Claim {
    location: String,
}

impl Claim {
    /// Claim `location` for a handle at `version`. On conflict returns the
    /// version of the handle that holds it.
    pub(crate) fn take(location: String, version: u32) -> Result<Self, u32> {
        let mut claims = claims();
        if let Some(held) = claims.get(&location) {
            return Err(*held);
        }
        claims.insert(location.clone(), version);
        Ok(Self { location })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        claims().remove(&self.location);
        debug!(location = %self.location, "claim released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_claim_per_location() {
        let location = format!("test:{}", uuid::Uuid::new_v4());
        let first = Claim::take(location.clone(), 2).unwrap();
        assert_eq!(Claim::take(location.clone(), 3).unwrap_err(), 2);
        drop(first);
        assert!(Claim::take(location, 3).is_ok());
    }
}
