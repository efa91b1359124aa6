//! Upstream source contract and error types.
//!
//! Every live producer in the fallback chain implements [`RiskSource`]. The
//! orchestrator treats any [`SourceError`] as "advance to the next step"; the
//! error kind only matters for telemetry.
//!
//! # Example
//!
//! ```rust,ignore
//! use firerisk_core::{EffisSource, RiskSource};
//!
//! async fn report(source: &EffisSource) {
//!     match source.fetch(55.95, -3.19).await {
//!         Ok(assessment) => println!("{}", assessment.level()),
//!         Err(error) => eprintln!("{}", error.code()),
//!     }
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{ProviderId, RiskAssessment, ValidationError};

/// Boxed future returned by [`RiskSource::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RiskAssessment, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidResponse,
    Internal,
}

/// Structured source error used for fallback telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_response(error.to_string())
    }
}

/// Live upstream producer contract.
///
/// Implementations make a single attempt per call; the orchestrator owns
/// timeouts and never retries within a step. A future dropped on timeout
/// must leave no work the caller has to wait for.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as one instance serves concurrent requests.
pub trait RiskSource: Send + Sync {
    /// Identifier used as the source tag of successful results.
    fn id(&self) -> ProviderId;

    /// Fetches the current risk for a full-precision coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the upstream is unreachable, rejects the
    /// request, or answers with a payload that cannot be normalized.
    fn fetch<'a>(&'a self, lat: f64, lon: f64) -> FetchFuture<'a>;

    /// Called after the orchestrator dropped a [`RiskSource::fetch`] future
    /// that did not finish within `budget`.
    ///
    /// The dropped future never observes its own outcome, so sources that
    /// track upstream health count the abandoned call here.
    fn step_timed_out(&self, budget: Duration) {
        let _ = budget;
    }
}
