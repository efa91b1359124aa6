use thiserror::Error;

use crate::ProviderId;

/// Validation and contract errors exposed by `firerisk-core`.
///
/// Coordinate variants intentionally carry no coordinate values so that an
/// error message can be logged without leaking a location.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NonFiniteCoordinate { field: &'static str },
    #[error("latitude must be within [-90, 90]")]
    LatitudeOutOfRange,
    #[error("longitude must be within [-180, 180]")]
    LongitudeOutOfRange,

    #[error("region bounds are invalid: {reason}")]
    InvalidRegion { reason: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("fwi index must be present exactly when the source is live (source '{source_id}')")]
    IndexSourceMismatch { source_id: ProviderId },
    #[error("freshness '{freshness}' does not match source '{source_id}'")]
    FreshnessSourceMismatch {
        freshness: &'static str,
        source_id: ProviderId,
    },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("invalid source '{value}', expected one of effis, sepa, cache, mock")]
    InvalidSource { value: String },
    #[error(
        "invalid risk level '{value}', expected one of \
         very_low, low, moderate, high, very_high, extreme"
    )]
    InvalidRiskLevel { value: String },

    #[error("cache key must be a non-empty geohash: '{value}'")]
    InvalidCacheKey { value: String },
}

/// Configuration errors raised while building an orchestrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("timeout '{field}' must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error(
        "per-step timeouts sum to {sum_ms}ms which exceeds the overall deadline of {deadline_ms}ms"
    )]
    StepBudgetExceedsDeadline { sum_ms: u128, deadline_ms: u128 },

    #[error("cache ttl must be greater than zero")]
    ZeroTtl,

    #[error("environment variable {name}='{value}' is invalid: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures raised by the cache layer and its persistence backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error("stored cache entry for '{key}' is corrupt and was discarded")]
    Corrupt { key: String },

    #[error("assessments from source '{source_id}' are never cached")]
    NotCacheable { source_id: ProviderId },
}

impl From<::duckdb::Error> for CacheError {
    fn from(error: ::duckdb::Error) -> Self {
        Self::Backend(error.to_string())
    }
}
