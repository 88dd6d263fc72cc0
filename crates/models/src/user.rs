use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.+-]+@gmail\.com$").expect("email pattern"));
// One capital, five more letters, four digits, two of @#&.
static PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z]{5}[0-9]{4}[@#&]{2}$").expect("password pattern"));

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Developer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country: String,
    pub city: String,
    pub street: String,
}

/// Registered account, keyed by email.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub full_name: String,
    pub address: Address,
    /// Calling code followed by the local number.
    pub phone: String,
    /// Argon2 PHC string; the plain password is never stored.
    pub password_hash: String,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_developer(&self) -> bool {
        self.role == Role::Developer
    }
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(ModelError::validation("email must be a gmail.com address"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ModelError> {
    if PASSWORD.is_match(password) {
        Ok(())
    } else {
        Err(ModelError::validation(
            "password needs 12 characters: 6 letters starting with a capital, 4 digits, 2 of @#&",
        ))
    }
}

pub fn validate_full_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::validation("full name required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_must_be_gmail() {
        assert!(validate_email("ana.perez+pub@gmail.com").is_ok());
        assert!(validate_email("ana@outlook.com").is_err());
        assert!(validate_email("@gmail.com").is_err());
        assert!(validate_email("ana@gmail.com.evil").is_err());
    }

    #[test]
    fn password_shape() {
        assert!(validate_password("Abcdef1234@#").is_ok());
        assert!(validate_password("Mpteen1234&&").is_ok());
        assert!(validate_password("abcdef1234@#").is_err());
        assert!(validate_password("Abcdef123@#").is_err());
        assert!(validate_password("Abcdef1234@!").is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_full_name("  ").is_err());
        assert!(validate_full_name("Ana").is_ok());
    }

    #[test]
    fn role_defaults_to_member_when_absent() {
        let json = r#"{"email":"a@gmail.com","fullName":"A","address":{"country":"España","city":"Madrid","street":"Gran Vía"},
            "phone":"+34600","passwordHash":"x","createdAt":"2024-01-01T00:00:00Z"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Member);
        assert!(!user.is_blocked);
        assert!(!user.is_developer());
    }
}
