//! Terminal fallback producing synthetic assessments.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::{GeographicContext, RiskAssessment, RiskLevel, ValidationError};

/// How the mock provider picks a risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum MockStrategy {
    /// Always the same level.
    Fixed(RiskLevel),
    /// A level derived reproducibly from the cache key.
    Keyed,
}

impl Default for MockStrategy {
    fn default() -> Self {
        Self::Fixed(RiskLevel::Moderate)
    }
}

impl Display for MockStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(level) => write!(f, "fixed:{level}"),
            Self::Keyed => f.write_str("keyed"),
        }
    }
}

impl FromStr for MockStrategy {
    type Err = ValidationError;

    /// Accepts `keyed`, `fixed` (moderate) or `fixed:<level>`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        match normalized.split_once(':') {
            None if normalized == "keyed" => Ok(Self::Keyed),
            None if normalized == "fixed" => Ok(Self::default()),
            Some(("fixed", level)) => Ok(Self::Fixed(level.parse()?)),
            _ => Err(ValidationError::InvalidRiskLevel {
                value: input.to_owned(),
            }),
        }
    }
}

/// Always-succeeding producer at the end of the fallback chain.
#[derive(Clone)]
pub struct MockFallbackProvider {
    strategy: MockStrategy,
    clock: Arc<dyn Clock>,
}

impl MockFallbackProvider {
    pub fn new(strategy: MockStrategy) -> Self {
        Self {
            strategy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn strategy(&self) -> MockStrategy {
        self.strategy
    }

    /// Produces a synthetic assessment for `context`. Never fails.
    pub fn produce(&self, context: &GeographicContext) -> RiskAssessment {
        let level = match self.strategy {
            MockStrategy::Fixed(level) => level,
            MockStrategy::Keyed => keyed_level(context.cache_key().as_str()),
        };
        RiskAssessment::synthetic(level, self.clock.now())
    }
}

impl Default for MockFallbackProvider {
    fn default() -> Self {
        Self::new(MockStrategy::default())
    }
}

fn keyed_level(key: &str) -> RiskLevel {
    let seed = key
        .bytes()
        .fold(7_u64, |acc, byte| acc.wrapping_mul(31).wrapping_add(u64::from(byte)));
    let index = usize::try_from(seed % RiskLevel::ALL.len() as u64).unwrap_or(0);
    RiskLevel::ALL[index]
}
