use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProviderId, UtcDateTime, ValidationError};

/// Upper FWI bound (exclusive) of each band below `Extreme`, in EFFIS order.
const FWI_BANDS: [(f64, RiskLevel); 5] = [
    (5.2, RiskLevel::VeryLow),
    (11.2, RiskLevel::Low),
    (21.3, RiskLevel::Moderate),
    (38.0, RiskLevel::High),
    (50.0, RiskLevel::VeryHigh),
];

/// Wildfire danger category, ordered from lowest to highest severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl RiskLevel {
    pub const ALL: [Self; 6] = [
        Self::VeryLow,
        Self::Low,
        Self::Moderate,
        Self::High,
        Self::VeryHigh,
        Self::Extreme,
    ];

    /// Classifies a Fire Weather Index value using the EFFIS danger bands.
    pub fn from_fwi(fwi: f64) -> Result<Self, ValidationError> {
        validate_fwi(fwi)?;
        let level = FWI_BANDS
            .iter()
            .find(|(upper, _)| fwi < *upper)
            .map(|(_, level)| *level)
            .unwrap_or(Self::Extreme);
        Ok(level)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very_high",
            Self::Extreme => "extreme",
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidRiskLevel {
                value: value.to_owned(),
            })
    }
}

/// How the value reached the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Produced by an upstream query during this request.
    Live,
    /// Served from a prior successful query.
    Cached,
    /// Produced by the mock fallback.
    Synthetic,
}

impl Freshness {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Synthetic => "synthetic",
        }
    }

    const fn expected_for(source: ProviderId) -> Self {
        match source {
            ProviderId::Effis | ProviderId::Sepa => Self::Live,
            ProviderId::Cache => Self::Cached,
            ProviderId::Mock => Self::Synthetic,
        }
    }
}

impl Display for Freshness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized wildfire risk result.
///
/// The FWI index is present exactly when `source` is a live producer, and
/// `freshness` always agrees with `source`. Values are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RiskAssessmentRecord")]
pub struct RiskAssessment {
    level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    fwi: Option<f64>,
    source: ProviderId,
    observed_at: UtcDateTime,
    freshness: Freshness,
}

impl RiskAssessment {
    /// Builds a live result, deriving the level from the FWI value.
    pub fn live(
        source: ProviderId,
        fwi: f64,
        observed_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        if !source.is_live() {
            return Err(ValidationError::IndexSourceMismatch { source_id: source });
        }
        let level = RiskLevel::from_fwi(fwi)?;
        Ok(Self {
            level,
            fwi: Some(fwi),
            source,
            observed_at,
            freshness: Freshness::Live,
        })
    }

    /// Builds the caller-facing form of a cache hit. `observed_at` must be the
    /// original observation time of the stored value.
    pub fn cached(level: RiskLevel, observed_at: UtcDateTime) -> Self {
        Self {
            level,
            fwi: None,
            source: ProviderId::Cache,
            observed_at,
            freshness: Freshness::Cached,
        }
    }

    pub fn synthetic(level: RiskLevel, observed_at: UtcDateTime) -> Self {
        Self {
            level,
            fwi: None,
            source: ProviderId::Mock,
            observed_at,
            freshness: Freshness::Synthetic,
        }
    }

    pub const fn level(&self) -> RiskLevel {
        self.level
    }

    pub const fn fwi(&self) -> Option<f64> {
        self.fwi
    }

    pub const fn source(&self) -> ProviderId {
        self.source
    }

    pub const fn observed_at(&self) -> UtcDateTime {
        self.observed_at
    }

    pub const fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Re-tags a stored live value for serving from the cache.
    pub fn to_cached(&self) -> Self {
        Self::cached(self.level, self.observed_at)
    }
}

#[derive(Debug, Deserialize)]
struct RiskAssessmentRecord {
    level: RiskLevel,
    #[serde(default)]
    fwi: Option<f64>,
    source: ProviderId,
    observed_at: UtcDateTime,
    freshness: Freshness,
}

impl TryFrom<RiskAssessmentRecord> for RiskAssessment {
    type Error = ValidationError;

    fn try_from(record: RiskAssessmentRecord) -> Result<Self, Self::Error> {
        if record.fwi.is_some() != record.source.is_live() {
            return Err(ValidationError::IndexSourceMismatch {
                source_id: record.source,
            });
        }
        if let Some(fwi) = record.fwi {
            validate_fwi(fwi)?;
        }
        if Freshness::expected_for(record.source) != record.freshness {
            return Err(ValidationError::FreshnessSourceMismatch {
                freshness: record.freshness.as_str(),
                source_id: record.source,
            });
        }

        Ok(Self {
            level: record.level,
            fwi: record.fwi,
            source: record.source,
            observed_at: record.observed_at,
            freshness: record.freshness,
        })
    }
}

fn validate_fwi(fwi: f64) -> Result<(), ValidationError> {
    if !fwi.is_finite() {
        return Err(ValidationError::NonFiniteValue { field: "fwi" });
    }
    if fwi < 0.0 {
        return Err(ValidationError::NegativeValue { field: "fwi" });
    }
    Ok(())
}
