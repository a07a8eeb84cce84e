//! Record shapes and country extraction
//!
//! Databases come in two shapes. The compact "country" files expose the
//! code directly:
//!
//! ```text
//! { "country_code": "US" }
//! ```
//!
//! The richer city-level files nest it, with the registered country as a
//! fallback for addresses that only have registration data:
//!
//! ```text
//! { "country": { "iso_code": "US" }, "registered_country": { "iso_code": "US" } }
//! ```

use crate::data_section::DataValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record shape, fixed when the database is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Top-level `country_code`
    Flat,
    /// `country.iso_code`, falling back to `registered_country.iso_code`
    Nested,
}

impl RecordFormat {
    /// Pull the country code out of a raw record
    pub fn extract_country(self, record: &DataValue) -> Option<CountryCode> {
        match self {
            RecordFormat::Flat => record
                .get("country_code")
                .and_then(DataValue::as_str)
                .and_then(CountryCode::new),
            RecordFormat::Nested => ["country", "registered_country"]
                .iter()
                .filter_map(|field| record.get(field))
                .filter_map(|section| section.get("iso_code"))
                .filter_map(DataValue::as_str)
                .find_map(CountryCode::new),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::Flat => write!(f, "flat"),
            RecordFormat::Nested => write!(f, "nested"),
        }
    }
}

/// Upper-cased ISO 3166-1 alpha-2 country code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Normalize a raw code; anything but two ASCII letters is not a country
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 2 && trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            Some(CountryCode(trimmed.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for CountryCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Outcome of a resolved lookup, as memoized by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The address maps to a country
    Country(CountryCode),
    /// The database has no country for the address
    NotFound,
}

impl Resolution {
    /// Country code, if any
    pub fn country(self) -> Option<CountryCode> {
        match self {
            Resolution::Country(code) => Some(code),
            Resolution::NotFound => None,
        }
    }

    /// Build from an optional code
    pub fn from_option(code: Option<CountryCode>) -> Self {
        code.map_or(Resolution::NotFound, Resolution::Country)
    }
}
