//! # Domain Models
//!
//! Canonical result types for wildfire risk retrieval.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RiskLevel`] | Six ordered danger categories |
//! | [`Freshness`] | Live, cached or synthetic origin of a value |
//! | [`RiskAssessment`] | Normalized result returned to callers |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! Assessments enforce their invariants at construction time:
//!
//! ```rust
//! use firerisk_core::{ProviderId, RiskAssessment, RiskLevel, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-07-01T12:00:00Z")?;
//! let live = RiskAssessment::live(ProviderId::Effis, 24.5, ts)?;
//! assert_eq!(live.level(), RiskLevel::High);
//!
//! // Only live producers carry an FWI index.
//! let invalid = RiskAssessment::live(ProviderId::Mock, 24.5, ts);
//! assert!(matches!(invalid, Err(ValidationError::IndexSourceMismatch { .. })));
//! # Ok::<(), ValidationError>(())
//! ```

mod risk;
mod timestamp;

pub use risk::{Freshness, RiskAssessment, RiskLevel};
pub use timestamp::UtcDateTime;
