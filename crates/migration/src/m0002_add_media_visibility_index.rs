use store::{IndexSchema, StoreResult, VersionChange};

use crate::schema::{MEDIA, MEDIA_BY_VISIBILITY};
use crate::MigrationStep;

pub struct Migration;

impl MigrationStep for Migration {
    fn version(&self) -> u32 {
        2
    }

    fn name(&self) -> &'static str {
        "m0002_add_media_visibility_index"
    }

    fn up(&self, change: &mut VersionChange) -> StoreResult<()> {
        // Built over media uploaded before the index existed.
        change.create_index(MEDIA, MEDIA_BY_VISIBILITY, IndexSchema::new("visibility"))?;
        Ok(())
    }
}
