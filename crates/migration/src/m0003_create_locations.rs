//! Create `locations`, the country catalogue used at registration.
use store::{CollectionSchema, StoreResult, VersionChange};

use crate::schema::{LOCATIONS, LOCATION_KEY};
use crate::MigrationStep;

pub struct Migration;

impl MigrationStep for Migration {
    fn version(&self) -> u32 {
        3
    }

    fn name(&self) -> &'static str {
        "m0003_create_locations"
    }

    fn up(&self, change: &mut VersionChange) -> StoreResult<()> {
        change.create_collection(LOCATIONS, CollectionSchema::keyed(LOCATION_KEY))?;
        Ok(())
    }
}
