use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Country with its calling code and known cities and streets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: String,
    pub phone_code: String,
    #[serde(default)]
    pub cities: BTreeMap<String, Vec<String>>,
}

impl Location {
    pub fn new(country: &str, phone_code: &str) -> Result<Self, ModelError> {
        let country = country.trim();
        if country.is_empty() {
            return Err(ModelError::validation("country name required"));
        }
        let phone_code = phone_code.trim();
        let digits = phone_code.strip_prefix('+').unwrap_or("");
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ModelError::validation("phone code must look like +34"));
        }
        Ok(Self { country: country.to_string(), phone_code: phone_code.to_string(), cities: BTreeMap::new() })
    }

    /// Returns `false` when the city is already listed.
    pub fn add_city(&mut self, city: &str) -> Result<bool, ModelError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ModelError::validation("city name required"));
        }
        if self.cities.contains_key(city) {
            return Ok(false);
        }
        self.cities.insert(city.to_string(), Vec::new());
        Ok(true)
    }

    /// Returns `false` when the street is already listed for `city`.
    pub fn add_street(&mut self, city: &str, street: &str) -> Result<bool, ModelError> {
        let street = street.trim();
        if street.is_empty() {
            return Err(ModelError::validation("street name required"));
        }
        let streets = self
            .cities
            .get_mut(city.trim())
            .ok_or_else(|| ModelError::validation(format!("unknown city `{city}` in {}", self.country)))?;
        if streets.iter().any(|s| s == street) {
            return Ok(false);
        }
        streets.push(street.to_string());
        Ok(true)
    }

    pub fn has_street(&self, city: &str, street: &str) -> bool {
        self.cities.get(city).is_some_and(|streets| streets.iter().any(|s| s == street))
    }
}

fn seeded(country: &str, phone_code: &str, cities: [(&str, [&str; 3]); 3]) -> Location {
    Location {
        country: country.to_string(),
        phone_code: phone_code.to_string(),
        cities: cities
            .into_iter()
            .map(|(city, streets)| (city.to_string(), streets.iter().map(|s| s.to_string()).collect()))
            .collect(),
    }
}

/// Catalogue written on first start.
pub fn default_locations() -> Vec<Location> {
    vec![
        seeded(
            "España",
            "+34",
            [
                ("Madrid", ["Gran Vía", "Paseo de la Castellana", "Calle Alcalá"]),
                ("Barcelona", ["Las Ramblas", "Paseo de Gracia", "Avinguda Diagonal"]),
                ("Valencia", ["Calle Colón", "Avenida del Puerto", "Calle de la Paz"]),
            ],
        ),
        seeded(
            "México",
            "+52",
            [
                ("Ciudad de México", ["Paseo de la Reforma", "Avenida Insurgentes", "Calle Madero"]),
                ("Guadalajara", ["Avenida Vallarta", "Calzada Independencia", "Avenida Chapultepec"]),
                ("Monterrey", ["Avenida Constitución", "Paseo de los Leones", "Avenida Garza Sada"]),
            ],
        ),
        seeded(
            "Colombia",
            "+57",
            [
                ("Bogotá", ["Carrera 7", "Avenida Jiménez", "Calle 85"]),
                ("Medellín", ["Avenida Poblado", "Carrera 70", "Avenida Las Vegas"]),
                ("Cali", ["Avenida Sexta", "Carrera 100", "Avenida Colombia"]),
            ],
        ),
        seeded(
            "Argentina",
            "+54",
            [
                ("Buenos Aires", ["Avenida 9 de Julio", "Avenida Corrientes", "Calle Florida"]),
                ("Córdoba", ["Avenida Colón", "Avenida Hipólito Yrigoyen", "Boulevard San Juan"]),
                ("Rosario", ["Avenida Pellegrini", "Boulevard Oroño", "Calle San Martín"]),
            ],
        ),
    ]
}
