use chrono::Utc;
use migration::schema::{LOCATIONS, USERS};
use models::{Address, Location, Role, User};
use store::{LocalStore, TransactionMode};
use tracing::{debug, info, instrument};

use super::domain::{LoginInput, RegisterInput};
use super::password;
use crate::errors::{ServiceError, ServiceResult};
use crate::session::Session;

/// Registration and login over the local store.
#[derive(Clone, Debug)]
pub struct AuthService {
    store: LocalStore,
}

impl AuthService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Register a member account.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use migration::Migrator;
    /// use service::auth::{domain::RegisterInput, AuthService};
    /// use service::locations::LocationService;
    /// use store::{LocalStore, MemoryBackend};
    ///
    /// let store = tokio_test::block_on(LocalStore::open(
    ///     Arc::new(MemoryBackend::new()), "doc", Migrator::latest_version(), &Migrator,
    /// )).unwrap();
    /// tokio_test::block_on(LocationService::new(store.clone()).seed_defaults()).unwrap();
    ///
    /// let svc = AuthService::new(store);
    /// let input = RegisterInput {
    ///     email: "ana@gmail.com".into(), full_name: "Ana".into(), password: "Abcdef1234@#".into(),
    ///     country: "España".into(), city: "Madrid".into(), street: "Gran Vía".into(), phone: "600111222".into(),
    /// };
    /// let user = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(user.phone, "+34600111222");
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> ServiceResult<User> {
        self.create_account(input, Role::Member).await
    }

    /// Validate, then in one transaction over `users` and `locations`:
    /// reject a taken email, record a new city or street in the catalogue,
    /// prefix the phone with the country's calling code and add the user.
    pub(crate) async fn create_account(&self, input: RegisterInput, role: Role) -> ServiceResult<User> {
        input.validate()?;
        let email = input.email.trim().to_string();
        let password_hash = password::hash(&input.password).await?;

        let mut tx = self.store.transaction(&[USERS, LOCATIONS], TransactionMode::ReadWrite).await?;
        if tx.get::<User>(USERS, email.as_str())?.is_some() {
            debug!("email already registered");
            return Err(ServiceError::AlreadyRegistered);
        }

        let country = input.country.trim();
        let mut location: Location = tx
            .get(LOCATIONS, country)?
            .ok_or_else(|| ServiceError::Validation(format!("unknown country `{country}`")))?;
        let city = input.city.trim().to_string();
        let street = input.street.trim().to_string();
        let new_city = location.add_city(&city)?;
        let new_street = location.add_street(&city, &street)?;
        if new_city || new_street {
            tx.put(LOCATIONS, &location)?;
        }

        let user = User {
            email,
            full_name: input.full_name.trim().to_string(),
            address: Address { country: location.country.clone(), city, street },
            phone: format!("{}{}", location.phone_code, input.phone.trim()),
            password_hash,
            is_blocked: false,
            role,
            created_at: Utc::now(),
        };
        match tx.add(USERS, &user) {
            Err(e) if e.is_recoverable() => return Err(ServiceError::AlreadyRegistered),
            other => other?,
        };
        tx.commit().await?;

        info!(email = %user.email, role = ?user.role, "user_registered");
        Ok(user)
    }

    /// Authenticate and open a session.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> ServiceResult<Session> {
        input.validate()?;
        let user = self
            .store
            .get::<User>(USERS, input.email.trim())
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;
        if !password::verify(&input.password, &user.password_hash).await? {
            return Err(ServiceError::InvalidCredentials);
        }
        if user.is_blocked {
            return Err(ServiceError::Blocked);
        }
        debug!(role = ?user.role, "login ok");
        Ok(Session::from(&user))
    }
}
