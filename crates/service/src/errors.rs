use models::ModelError;
use store::StoreError;
use thiserror::Error;

/// Business errors surfaced to callers of the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is blocked")]
    Blocked,
    #[error("operation not permitted")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("hashing error: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::AlreadyRegistered => 1002,
            ServiceError::NotFound(_) => 1003,
            ServiceError::InvalidCredentials => 1004,
            ServiceError::Blocked => 1005,
            ServiceError::Forbidden => 1006,
            ServiceError::Hash(_) => 1101,
            ServiceError::Store(_) => 1200,
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) | ModelError::Payload(msg) => ServiceError::Validation(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
