use models::{Role, User};
use serde::{Deserialize, Serialize};

/// Signed-in user, returned by login and passed to every operation that
/// acts on someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl Session {
    pub fn is_developer(&self) -> bool {
        self.role == Role::Developer
    }
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self { email: user.email.clone(), full_name: user.full_name.clone(), role: user.role }
    }
}
