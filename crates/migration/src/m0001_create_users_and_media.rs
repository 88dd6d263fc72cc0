//! Create `users` and `media`.
//!
//! Users are keyed by email; media get sequential ids and point back to
//! their owner through `userId`.
use store::{CollectionSchema, IndexSchema, StoreResult, VersionChange};

use crate::schema::*;
use crate::MigrationStep;

pub struct Migration;

impl MigrationStep for Migration {
    fn version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "m0001_create_users_and_media"
    }

    fn up(&self, change: &mut VersionChange) -> StoreResult<()> {
        change.create_collection(
            USERS,
            CollectionSchema::keyed(USER_KEY)
                .with_index(USERS_BY_NAME, IndexSchema::new("fullName"))
                .with_index(USERS_BY_BLOCKED, IndexSchema::new("isBlocked")),
        )?;
        change.create_collection(
            MEDIA,
            CollectionSchema::auto_increment(MEDIA_KEY)
                .with_index(MEDIA_BY_USER, IndexSchema::new("userId"))
                .with_index(MEDIA_BY_TIMESTAMP, IndexSchema::new("timestamp")),
        )?;
        Ok(())
    }
}
