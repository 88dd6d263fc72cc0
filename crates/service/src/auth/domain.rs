use models::user::{validate_email, validate_full_name, validate_password};
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub country: String,
    pub city: String,
    pub street: String,
    /// Local number without the calling code.
    pub phone: String,
}

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    /// A malformed email never reaches the store.
    pub fn validate(&self) -> ServiceResult<()> {
        validate_email(self.email.trim())?;
        if self.password.is_empty() {
            return Err(ServiceError::Validation("password required".into()));
        }
        Ok(())
    }
}

impl RegisterInput {
    /// Field checks done before the store is touched.
    pub fn validate(&self) -> ServiceResult<()> {
        validate_email(self.email.trim())?;
        validate_full_name(&self.full_name)?;
        validate_password(&self.password)?;
        for (field, value) in [("country", &self.country), ("city", &self.city), ("street", &self.street)] {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!("{field} required")));
            }
        }
        let phone = self.phone.trim();
        if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::Validation("phone must contain digits only".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RegisterInput {
        RegisterInput {
            email: "ana@gmail.com".into(),
            full_name: "Ana Pérez".into(),
            password: "Abcdef1234@#".into(),
            country: "España".into(),
            city: "Madrid".into(),
            street: "Gran Vía".into(),
            phone: "600111222".into(),
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn each_field_is_checked() {
        let cases: [fn(&mut RegisterInput); 5] = [
            |i| i.email = "ana@yahoo.com".into(),
            |i| i.full_name = " ".into(),
            |i| i.password = "short".into(),
            |i| i.city = "".into(),
            |i| i.phone = "+34 600".into(),
        ];
        for mutate in cases {
            let mut i = input();
            mutate(&mut i);
            assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));
        }
    }

    #[test]
    fn login_needs_a_gmail_address_and_a_password() {
        let ok = LoginInput { email: " ana@gmail.com ".into(), password: "x".into() };
        assert!(ok.validate().is_ok());
        for (email, password) in [("ana@hotmail.com", "x"), ("", "x"), ("ana@gmail.com", "")] {
            let input = LoginInput { email: email.into(), password: password.into() };
            assert!(matches!(input.validate(), Err(ServiceError::Validation(_))));
        }
    }
}
