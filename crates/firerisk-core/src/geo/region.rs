use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Rectangular region in which the secondary source is eligible.
///
/// Containment is inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegionBoundsRecord")]
pub struct RegionBounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl RegionBounds {
    pub fn new(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("min_lat", min_lat),
            ("max_lat", max_lat),
            ("min_lon", min_lon),
            ("max_lon", max_lon),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::InvalidRegion {
                    reason: format!("{field} must be finite"),
                });
            }
        }

        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(ValidationError::InvalidRegion {
                reason: String::from("latitudes must be within [-90, 90]"),
            });
        }
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            return Err(ValidationError::InvalidRegion {
                reason: String::from("longitudes must be within [-180, 180]"),
            });
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(ValidationError::InvalidRegion {
                reason: String::from("minimum bound exceeds maximum bound"),
            });
        }

        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Mainland Scotland and its islands.
    pub const fn scotland() -> Self {
        Self {
            min_lat: 54.6,
            max_lat: 60.9,
            min_lon: -9.0,
            max_lon: -0.7,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub const fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub const fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub const fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub const fn max_lon(&self) -> f64 {
        self.max_lon
    }
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self::scotland()
    }
}

#[derive(Debug, Deserialize)]
struct RegionBoundsRecord {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl TryFrom<RegionBoundsRecord> for RegionBounds {
    type Error = ValidationError;

    fn try_from(record: RegionBoundsRecord) -> Result<Self, Self::Error> {
        Self::new(record.min_lat, record.max_lat, record.min_lon, record.max_lon)
    }
}

/// Parses `min_lat,max_lat,min_lon,max_lon`.
impl FromStr for RegionBounds {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| ValidationError::InvalidRegion {
                reason: format!("bounds must be numeric: {error}"),
            })?;

        match parts.as_slice() {
            [min_lat, max_lat, min_lon, max_lon] => {
                Self::new(*min_lat, *max_lat, *min_lon, *max_lon)
            }
            _ => Err(ValidationError::InvalidRegion {
                reason: format!("expected 4 comma-separated bounds, got {}", parts.len()),
            }),
        }
    }
}
