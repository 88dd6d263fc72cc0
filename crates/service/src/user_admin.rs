//! Developer moderation panel: list, block, rename and delete accounts.
//!
//! The session's role is never trusted on its own; each call re-reads the
//! caller's stored record.

use migration::schema::{MEDIA, USERS};
use models::{user::validate_full_name, Media, Role, User};
use store::{LocalStore, Transaction, TransactionMode};
use tracing::{info, instrument, warn};

use crate::auth::{domain::RegisterInput, AuthService};
use crate::errors::{ServiceError, ServiceResult};
use crate::session::Session;

#[derive(Clone, Debug)]
pub struct UserAdminService {
    store: LocalStore,
}

impl UserAdminService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub async fn list_users(&self, session: &Session) -> ServiceResult<Vec<User>> {
        let mut tx = self.store.transaction(&[USERS], TransactionMode::ReadOnly).await?;
        require_developer(&mut tx, session)?;
        Ok(tx.get_all(USERS)?)
    }

    /// Flip the blocked flag; returns the new state.
    #[instrument(skip(self, session), fields(by = %session.email))]
    pub async fn toggle_block(&self, session: &Session, email: &str) -> ServiceResult<bool> {
        if email == session.email {
            return Err(ServiceError::Validation("developers cannot block themselves".into()));
        }
        let mut tx = self.store.transaction(&[USERS], TransactionMode::ReadWrite).await?;
        require_developer(&mut tx, session)?;
        let mut user: User = tx.get(USERS, email)?.ok_or_else(|| ServiceError::not_found("user"))?;
        user.is_blocked = !user.is_blocked;
        tx.put(USERS, &user)?;
        tx.commit().await?;
        info!(email, blocked = user.is_blocked, "user_block_toggled");
        Ok(user.is_blocked)
    }

    pub async fn rename(&self, session: &Session, email: &str, full_name: &str) -> ServiceResult<User> {
        validate_full_name(full_name)?;
        let mut tx = self.store.transaction(&[USERS], TransactionMode::ReadWrite).await?;
        require_developer(&mut tx, session)?;
        let mut user: User = tx.get(USERS, email)?.ok_or_else(|| ServiceError::not_found("user"))?;
        user.full_name = full_name.trim().to_string();
        tx.put(USERS, &user)?;
        tx.commit().await?;
        Ok(user)
    }

    /// Delete the account and every media record it owns, atomically.
    /// Returns how many media records were removed.
    #[instrument(skip(self, session), fields(by = %session.email))]
    pub async fn delete_user(&self, session: &Session, email: &str) -> ServiceResult<usize> {
        let mut tx = self.store.transaction(&[USERS, MEDIA], TransactionMode::ReadWrite).await?;
        require_developer(&mut tx, session)?;
        if !tx.delete(USERS, email)? {
            return Err(ServiceError::not_found("user"));
        }
        let removed = tx.iterate_and_delete(MEDIA, |m: &Media| m.user_id == email)?;
        tx.commit().await?;
        info!(email, media_removed = removed, "user_deleted");
        Ok(removed)
    }

    /// Create a developer account. Not reachable from registration; used
    /// by operators through the CLI.
    pub async fn provision_developer(&self, input: RegisterInput) -> ServiceResult<User> {
        let user = AuthService::new(self.store.clone()).create_account(input, Role::Developer).await?;
        warn!(email = %user.email, "developer account provisioned");
        Ok(user)
    }
}

fn require_developer(tx: &mut Transaction, session: &Session) -> ServiceResult<()> {
    match tx.get::<User>(USERS, session.email.as_str())? {
        Some(user) if user.is_developer() && !user.is_blocked => Ok(()),
        _ => Err(ServiceError::Forbidden),
    }
}
