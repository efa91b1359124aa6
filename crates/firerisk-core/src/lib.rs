//! # Firerisk Core
//!
//! Resilient retrieval of wildfire danger ratings for a coordinate.
//!
//! ## Overview
//!
//! A request walks a fixed fallback chain and stops at the first success:
//!
//! 1. **EFFIS** Fire Weather Index service (always attempted)
//! 2. **Regional feed** for coordinates inside the eligible region
//! 3. **Cache** of earlier live results, keyed by a coarse geohash
//! 4. **Mock** provider, which cannot fail
//!
//! Invalid coordinates are the only error a caller can observe. Every other
//! failure, timeout or miss becomes a [`ServiceAttempt`] record and the next
//! step runs.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | EFFIS and regional feed adapters |
//! | [`cache`] | TTL cache store and key-value backends |
//! | [`circuit_breaker`] | Fail-fast guard for upstream calls |
//! | [`clock`] | Wall-clock abstraction |
//! | [`config`] | Orchestrator configuration |
//! | [`data_source`] | Source trait and error types |
//! | [`domain`] | Risk levels, assessments, timestamps |
//! | [`error`] | Core error types |
//! | [`geo`] | Coordinate validation, region test, cache keys, redaction |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`mock`] | Terminal synthetic provider |
//! | [`orchestrator`] | The fallback chain |
//! | [`source`] | Producer identifiers |
//! | [`telemetry`] | Step and request records |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use firerisk_core::{FallbackOrchestratorBuilder, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = FallbackOrchestratorBuilder::new(OrchestratorConfig::from_env()?)
//!         .with_real_clients()
//!         .build()?;
//!
//!     let assessment = orchestrator.get_current(55.9533, -3.1883, None).await?;
//!     println!("{} via {}", assessment.level(), assessment.source());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ FallbackOrchestrator │──────────────▶ TelemetryRecorder
//! └──────────┬───────────┘
//!            │ sequential, per-step timeout
//!            ▼
//!   EffisSource ─▶ SepaSource ─▶ CacheStore ─▶ MockFallbackProvider
//!        │             │             │
//!        └─ HttpClient ┘       KeyValueBackend
//!                              (memory / DuckDB)
//! ```
//!
//! ## Privacy
//!
//! Full-precision coordinates are only handed to live sources. Logs and
//! telemetry use [`log_redact`] (two decimals) and cache keys are 5-character
//! geohashes.

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod geo;
pub mod http_client;
pub mod mock;
pub mod orchestrator;
pub mod source;
pub mod telemetry;

pub use adapters::{EffisSource, SepaSource};
pub use cache::{
    CacheEntry, CacheLookup, CacheStore, DuckDbBackend, KeyValueBackend, MemoryBackend,
    TtlCacheStore,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OrchestratorConfig;
pub use data_source::{FetchFuture, RiskSource, SourceError, SourceErrorKind};
pub use domain::{Freshness, RiskAssessment, RiskLevel, UtcDateTime};
pub use error::{CacheError, ConfigError, ValidationError};
pub use geo::{log_redact, CacheKey, GeographicContext, RegionBounds, CACHE_KEY_PRECISION};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, OfflineHttpClient,
    ReqwestHttpClient,
};
pub use mock::{MockFallbackProvider, MockStrategy};
pub use orchestrator::{FallbackOrchestrator, FallbackOrchestratorBuilder, FallbackOutcome};
pub use source::ProviderId;
pub use telemetry::{
    FailureReason, InMemoryTelemetrySink, NoopTelemetrySink, RequestSummary, ServiceAttempt,
    SkipReason, TelemetryRecorder, TelemetrySink, TracingTelemetrySink,
};
