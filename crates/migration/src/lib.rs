//! Migrator registering the schema steps in version order.
//! Each step only adds collections or indexes.
use store::{StoreResult, Upgrade, VersionChange};
use tracing::info;

pub mod schema;

mod m0001_create_users_and_media;
mod m0002_add_media_visibility_index;
mod m0003_create_locations;

/// One schema version. `up` must be safe to run against a store that
/// already has some or all of what it creates.
pub trait MigrationStep: Send + Sync {
    fn version(&self) -> u32;
    fn name(&self) -> &'static str;
    fn up(&self, change: &mut VersionChange) -> StoreResult<()>;
}

pub struct Migrator;

impl Migrator {
    pub fn migrations() -> Vec<Box<dyn MigrationStep>> {
        vec![
            Box::new(m0001_create_users_and_media::Migration),
            Box::new(m0002_add_media_visibility_index::Migration),
            Box::new(m0003_create_locations::Migration),
        ]
    }

    pub fn latest_version() -> u32 {
        Self::migrations().iter().map(|m| m.version()).max().unwrap_or(1)
    }
}

impl Upgrade for Migrator {
    fn upgrade(&self, change: &mut VersionChange) -> StoreResult<()> {
        let (from, to) = (change.old_version(), change.new_version());
        for step in Self::migrations() {
            if step.version() > from && step.version() <= to {
                info!(version = step.version(), step = step.name(), "applying migration");
                step.up(change)?;
            }
        }
        Ok(())
    }
}
