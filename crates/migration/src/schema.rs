//! Collection and index names shared by the migrations and the services.

pub const USERS: &str = "users";
pub const MEDIA: &str = "media";
pub const LOCATIONS: &str = "locations";

pub const USER_KEY: &str = "email";
pub const USERS_BY_NAME: &str = "fullName";
pub const USERS_BY_BLOCKED: &str = "isBlocked";

pub const MEDIA_KEY: &str = "id";
pub const MEDIA_BY_USER: &str = "userId";
pub const MEDIA_BY_TIMESTAMP: &str = "timestamp";
pub const MEDIA_BY_VISIBILITY: &str = "visibility";

pub const LOCATION_KEY: &str = "country";
