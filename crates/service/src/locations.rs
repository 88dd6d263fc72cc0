use migration::schema::LOCATIONS;
use models::{location::default_locations, Location};
use store::{LocalStore, TransactionMode};
use tracing::info;

use crate::errors::{ServiceError, ServiceResult};

/// Country, city and street catalogue. Entries are only ever added.
#[derive(Clone, Debug)]
pub struct LocationService {
    store: LocalStore,
}

impl LocationService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Insert the default countries that are not stored yet; existing
    /// entries, including cities added later, are left alone.
    pub async fn seed_defaults(&self) -> ServiceResult<usize> {
        let mut tx = self.store.transaction(&[LOCATIONS], TransactionMode::ReadWrite).await?;
        let mut inserted = 0;
        for location in default_locations() {
            if tx.get::<Location>(LOCATIONS, location.country.as_str())?.is_none() {
                tx.add(LOCATIONS, &location)?;
                inserted += 1;
            }
        }
        tx.commit().await?;
        if inserted > 0 {
            info!(inserted, "locations_seeded");
        }
        Ok(inserted)
    }

    pub async fn countries(&self) -> ServiceResult<Vec<Location>> {
        let mut all: Vec<Location> = self.store.get_all(LOCATIONS).await?;
        all.sort_by(|a, b| a.country.cmp(&b.country));
        Ok(all)
    }

    pub async fn cities(&self, country: &str) -> ServiceResult<Vec<String>> {
        Ok(self.location(country).await?.cities.into_keys().collect())
    }

    pub async fn streets(&self, country: &str, city: &str) -> ServiceResult<Vec<String>> {
        self.location(country)
            .await?
            .cities
            .remove(city)
            .ok_or_else(|| ServiceError::not_found("city"))
    }

    /// Returns `false` when the country already exists.
    pub async fn add_country(&self, country: &str, phone_code: &str) -> ServiceResult<bool> {
        let location = Location::new(country, phone_code)?;
        let mut tx = self.store.transaction(&[LOCATIONS], TransactionMode::ReadWrite).await?;
        if tx.get::<Location>(LOCATIONS, location.country.as_str())?.is_some() {
            return Ok(false);
        }
        tx.add(LOCATIONS, &location)?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn add_city(&self, country: &str, city: &str) -> ServiceResult<bool> {
        self.update(country, |loc| Ok(loc.add_city(city)?)).await
    }

    pub async fn add_street(&self, country: &str, city: &str, street: &str) -> ServiceResult<bool> {
        self.update(country, |loc| Ok(loc.add_street(city, street)?)).await
    }

    async fn location(&self, country: &str) -> ServiceResult<Location> {
        self.store
            .get::<Location>(LOCATIONS, country)
            .await?
            .ok_or_else(|| ServiceError::not_found("country"))
    }

    async fn update<F>(&self, country: &str, apply: F) -> ServiceResult<bool>
    where
        F: FnOnce(&mut Location) -> ServiceResult<bool>,
    {
        let mut tx = self.store.transaction(&[LOCATIONS], TransactionMode::ReadWrite).await?;
        let mut location: Location = tx.get(LOCATIONS, country)?.ok_or_else(|| ServiceError::not_found("country"))?;
        if !apply(&mut location)? {
            return Ok(false);
        }
        tx.put(LOCATIONS, &location)?;
        tx.commit().await?;
        Ok(true)
    }
}
