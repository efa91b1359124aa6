use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::geohash;
use super::region::RegionBounds;
use crate::ValidationError;

/// Geohash length used for cache keys (cells of roughly 4.9 km x 4.9 km).
pub const CACHE_KEY_PRECISION: usize = 5;

const STORAGE_PREFIX: &str = "fire_risk:v1:";

/// Coarse, privacy-preserving spatial key for cached results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_coordinates(lat: f64, lon: f64) -> Self {
        Self(geohash::encode(lat, lon, CACHE_KEY_PRECISION))
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= CACHE_KEY_PRECISION
            && trimmed
                .chars()
                .all(|ch| {
                    ch.is_ascii_digit()
                        || (ch.is_ascii_lowercase() && !matches!(ch, 'a' | 'i' | 'l' | 'o'))
                });
        if !valid {
            return Err(ValidationError::InvalidCacheKey {
                value: input.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespaced key used in the persistence backend.
    pub fn storage_key(&self) -> String {
        format!("{STORAGE_PREFIX}{}", self.0)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for CacheKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CacheKey> for String {
    fn from(value: CacheKey) -> Self {
        value.0
    }
}

/// Validated, classified request location.
///
/// Built once per request. `Debug` and `Display` only ever show the
/// redacted two-decimal form of the coordinates.
#[derive(Clone, PartialEq)]
pub struct GeographicContext {
    lat: f64,
    lon: f64,
    in_region: bool,
    cache_key: CacheKey,
}

impl GeographicContext {
    /// Validates the coordinates and classifies them against `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when either value is NaN or infinite, or
    /// when latitude is outside [-90, 90] or longitude outside [-180, 180].
    pub fn build(lat: f64, lon: f64, region: &RegionBounds) -> Result<Self, ValidationError> {
        if !lat.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { field: "latitude" });
        }
        if !lon.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { field: "longitude" });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::LongitudeOutOfRange);
        }

        Ok(Self {
            lat,
            lon,
            in_region: region.contains(lat, lon),
            cache_key: CacheKey::for_coordinates(lat, lon),
        })
    }

    /// Full-precision latitude. Only for upstream queries, never for logs.
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Full-precision longitude. Only for upstream queries, never for logs.
    pub const fn lon(&self) -> f64 {
        self.lon
    }

    pub const fn in_region(&self) -> bool {
        self.in_region
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn redacted(&self) -> String {
        log_redact(self.lat, self.lon)
    }
}

impl Debug for GeographicContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeographicContext")
            .field("location", &self.redacted())
            .field("in_region", &self.in_region)
            .field("cache_key", &self.cache_key.as_str())
            .finish()
    }
}

impl Display for GeographicContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Formats a coordinate pair as `"{lat},{lon}"` rounded to two decimals.
///
/// This is the only coordinate form allowed in logs and telemetry.
pub fn log_redact(lat: f64, lon: f64) -> String {
    format!("{:.2},{:.2}", round2(lat), round2(lon))
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Collapse -0.0 so that tiny negatives do not print as "-0.00".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
