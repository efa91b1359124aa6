use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical producer identifiers used as result source tags and fallback step names.
///
/// The declaration order is the fallback chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// EFFIS fire weather index service, always attempted first.
    Effis,
    /// Regional fire danger feed, only for coordinates inside the eligible region.
    Sepa,
    Cache,
    Mock,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [Self::Effis, Self::Sepa, Self::Cache, Self::Mock];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Effis => "effis",
            Self::Sepa => "sepa",
            Self::Cache => "cache",
            Self::Mock => "mock",
        }
    }

    /// True for the two producers that query upstream data for this request.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Effis | Self::Sepa)
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "effis" => Ok(Self::Effis),
            "sepa" => Ok(Self::Sepa),
            "cache" => Ok(Self::Cache),
            "mock" => Ok(Self::Mock),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
