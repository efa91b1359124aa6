//! Orchestrator configuration.
//!
//! # Environment Variables
//!
//! | Variable | Format | Default |
//! |----------|--------|---------|
//! | `FIRERISK_DEADLINE_MS` | milliseconds | `8000` |
//! | `FIRERISK_PRIMARY_TIMEOUT_MS` | milliseconds | `3000` |
//! | `FIRERISK_SECONDARY_TIMEOUT_MS` | milliseconds | `2000` |
//! | `FIRERISK_CACHE_TIMEOUT_MS` | milliseconds | `200` |
//! | `FIRERISK_CACHE_TTL_SECS` | seconds | `21600` |
//! | `FIRERISK_MOCK_STRATEGY` | `fixed:<level>` or `keyed` | `fixed:moderate` |
//! | `FIRERISK_REGION` | `min_lat,max_lat,min_lon,max_lon` | Scotland |

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL;
use crate::{ConfigError, MockStrategy, RegionBounds};

pub const ENV_DEADLINE_MS: &str = "FIRERISK_DEADLINE_MS";
pub const ENV_PRIMARY_TIMEOUT_MS: &str = "FIRERISK_PRIMARY_TIMEOUT_MS";
pub const ENV_SECONDARY_TIMEOUT_MS: &str = "FIRERISK_SECONDARY_TIMEOUT_MS";
pub const ENV_CACHE_TIMEOUT_MS: &str = "FIRERISK_CACHE_TIMEOUT_MS";
pub const ENV_CACHE_TTL_SECS: &str = "FIRERISK_CACHE_TTL_SECS";
pub const ENV_MOCK_STRATEGY: &str = "FIRERISK_MOCK_STRATEGY";
pub const ENV_REGION: &str = "FIRERISK_REGION";

/// Timeouts, cache lifetime, mock strategy and secondary region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(rename = "deadline_ms", with = "duration_ms")]
    deadline: Duration,
    #[serde(rename = "primary_timeout_ms", with = "duration_ms")]
    primary_timeout: Duration,
    #[serde(rename = "secondary_timeout_ms", with = "duration_ms")]
    secondary_timeout: Duration,
    #[serde(rename = "cache_timeout_ms", with = "duration_ms")]
    cache_timeout: Duration,
    #[serde(rename = "cache_ttl_ms", with = "duration_ms")]
    cache_ttl: Duration,
    mock_strategy: MockStrategy,
    region: RegionBounds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(8_000),
            primary_timeout: Duration::from_millis(3_000),
            secondary_timeout: Duration::from_millis(2_000),
            cache_timeout: Duration::from_millis(200),
            cache_ttl: DEFAULT_CACHE_TTL,
            mock_strategy: MockStrategy::default(),
            region: RegionBounds::scotland(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with any `FIRERISK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for unparsable values, or any
    /// error from [`OrchestratorConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`OrchestratorConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DEADLINE_MS) {
            config.deadline = Duration::from_millis(parse_u64(ENV_DEADLINE_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_PRIMARY_TIMEOUT_MS) {
            config.primary_timeout =
                Duration::from_millis(parse_u64(ENV_PRIMARY_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_SECONDARY_TIMEOUT_MS) {
            config.secondary_timeout =
                Duration::from_millis(parse_u64(ENV_SECONDARY_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_CACHE_TIMEOUT_MS) {
            config.cache_timeout =
                Duration::from_millis(parse_u64(ENV_CACHE_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_CACHE_TTL_SECS) {
            config.cache_ttl = Duration::from_secs(parse_u64(ENV_CACHE_TTL_SECS, &value)?);
        }
        if let Some(value) = lookup(ENV_MOCK_STRATEGY) {
            config.mock_strategy = value.parse().map_err(|error: crate::ValidationError| {
                ConfigError::InvalidEnv {
                    name: ENV_MOCK_STRATEGY,
                    value: value.clone(),
                    reason: error.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_REGION) {
            config.region = value.parse().map_err(|error: crate::ValidationError| {
                ConfigError::InvalidEnv {
                    name: ENV_REGION,
                    value: value.clone(),
                    reason: error.to_string(),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that every timeout is positive and the step budgets fit the deadline.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("deadline", self.deadline),
            ("primary_timeout", self.primary_timeout),
            ("secondary_timeout", self.secondary_timeout),
            ("cache_timeout", self.cache_timeout),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroTimeout { field: *field });
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }

        let sum = self.primary_timeout + self.secondary_timeout + self.cache_timeout;
        if sum > self.deadline {
            return Err(ConfigError::StepBudgetExceedsDeadline {
                sum_ms: sum.as_millis(),
                deadline_ms: self.deadline.as_millis(),
            });
        }
        Ok(())
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_step_timeouts(
        mut self,
        primary: Duration,
        secondary: Duration,
        cache: Duration,
    ) -> Self {
        self.primary_timeout = primary;
        self.secondary_timeout = secondary;
        self.cache_timeout = cache;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_mock_strategy(mut self, strategy: MockStrategy) -> Self {
        self.mock_strategy = strategy;
        self
    }

    pub fn with_region(mut self, region: RegionBounds) -> Self {
        self.region = region;
        self
    }

    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    pub const fn primary_timeout(&self) -> Duration {
        self.primary_timeout
    }

    pub const fn secondary_timeout(&self) -> Duration {
        self.secondary_timeout
    }

    pub const fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }

    pub const fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub const fn mock_strategy(&self) -> MockStrategy {
        self.mock_strategy
    }

    pub const fn region(&self) -> &RegionBounds {
        &self.region
    }
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|error| ConfigError::InvalidEnv {
            name,
            value: value.to_owned(),
            reason: error.to_string(),
        })
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
