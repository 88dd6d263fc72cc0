use argon2::{
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use rand::rngs::OsRng;

use crate::errors::{ServiceError, ServiceResult};

/// Salted argon2 hash in PHC string form. Runs on the blocking pool.
pub async fn hash(password: &str) -> ServiceResult<String> {
    let password = password.to_owned();
    blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ServiceError::Hash(e.to_string()))
    })
    .await
}

pub async fn verify(password: &str, phc: &str) -> ServiceResult<bool> {
    let (password, phc) = (password.to_owned(), phc.to_owned());
    blocking(move || {
        let parsed = PasswordHash::new(&phc).map_err(|e| ServiceError::Hash(e.to_string()))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
}

async fn blocking<T, F>(work: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| ServiceError::Hash(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn hash_then_verify() -> Result<(), anyhow::Error> {
        let phc = hash("Abcdef1234@#").await?;
        assert!(phc.starts_with("$argon2"));
        assert!(verify("Abcdef1234@#", &phc).await?);
        assert!(!verify("Abcdef1234@&", &phc).await?);
        assert_ne!(hash("Abcdef1234@#").await?, phc);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        assert!(matches!(verify("x", "plaintext").await, Err(ServiceError::Hash(_))));
    }

    #[tokio::test]
    async fn hashing_leaves_the_runtime_thread_free() -> Result<(), anyhow::Error> {
        let side_done = AtomicBool::new(false);
        let (seen_before_hash_finished, ()) = tokio::join!(
            async {
                let phc = hash("Abcdef1234@#").await;
                phc.map(|_| side_done.load(Ordering::SeqCst))
            },
            async {
                tokio::task::yield_now().await;
                side_done.store(true, Ordering::SeqCst);
            }
        );
        assert!(seen_before_hash_finished?);
        Ok(())
    }
}
