//! Per-step and per-request telemetry.
//!
//! Every request produces one [`ServiceAttempt`] per fallback step it
//! reached, followed by a single [`RequestSummary`]. Records are handed to a
//! [`TelemetrySink`] through a [`TelemetryRecorder`], which isolates the
//! request path from sink failures.
//!
//! Records never contain a full-precision coordinate; the summary carries
//! the redacted `"{lat},{lon}"` form only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Freshness, ProviderId, RiskLevel};

const TELEMETRY_TARGET: &str = "firerisk::telemetry";

/// Why a step was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OutOfRegion,
    CacheEmpty,
    CacheExpired,
    DeadlineExceeded,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutOfRegion => "out_of_region",
            Self::CacheEmpty => "cache_empty",
            Self::CacheExpired => "cache_expired",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Why an attempted step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout { budget_ms: u64 },
    Upstream { code: String, message: String },
    Cache { message: String },
}

impl FailureReason {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Upstream { .. } => "upstream",
            Self::Cache { .. } => "cache",
        }
    }
}

/// Outcome of one fallback step.
///
/// `elapsed_ms` is present exactly when the step was attempted; a skipped
/// step carries a [`SkipReason`] and an attempted failure a [`FailureReason`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAttempt {
    step: ProviderId,
    attempted: bool,
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<ProviderId>,
}

impl ServiceAttempt {
    pub fn succeeded(step: ProviderId, elapsed: Duration) -> Self {
        Self {
            step,
            attempted: true,
            succeeded: true,
            elapsed_ms: Some(duration_ms(elapsed)),
            skip_reason: None,
            failure: None,
            origin: None,
        }
    }

    pub fn failed(step: ProviderId, elapsed: Duration, failure: FailureReason) -> Self {
        Self {
            step,
            attempted: true,
            succeeded: false,
            elapsed_ms: Some(duration_ms(elapsed)),
            skip_reason: None,
            failure: Some(failure),
            origin: None,
        }
    }

    pub fn skipped(step: ProviderId, reason: SkipReason) -> Self {
        Self {
            step,
            attempted: false,
            succeeded: false,
            elapsed_ms: None,
            skip_reason: Some(reason),
            failure: None,
            origin: None,
        }
    }

    /// Records which live producer originally wrote a cache hit.
    pub fn with_origin(mut self, origin: ProviderId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub const fn step(&self) -> ProviderId {
        self.step
    }

    pub const fn attempted(&self) -> bool {
        self.attempted
    }

    pub const fn is_success(&self) -> bool {
        self.succeeded
    }

    pub const fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed_ms
    }

    pub const fn skip_reason(&self) -> Option<SkipReason> {
        self.skip_reason
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub const fn origin(&self) -> Option<ProviderId> {
        self.origin
    }
}

/// One record per request, emitted after its step records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: Uuid,
    pub location: String,
    pub source: ProviderId,
    pub freshness: Freshness,
    pub level: RiskLevel,
    pub attempts: Vec<ServiceAttempt>,
    pub total_elapsed_ms: u64,
}

/// Destination for telemetry records.
///
/// Implementations are shared across concurrent requests and should return
/// promptly; slow transports belong behind a channel.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, attempt: &ServiceAttempt);

    fn record_request(&self, summary: &RequestSummary) {
        let _ = summary;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _attempt: &ServiceAttempt) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryTelemetrySink {
    attempts: Mutex<Vec<ServiceAttempt>>,
    requests: Mutex<Vec<RequestSummary>>,
}

impl InMemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<ServiceAttempt> {
        self.attempts
            .lock()
            .expect("telemetry attempt store is not poisoned")
            .clone()
    }

    pub fn requests(&self) -> Vec<RequestSummary> {
        self.requests
            .lock()
            .expect("telemetry request store is not poisoned")
            .clone()
    }

    pub fn clear(&self) {
        self.attempts
            .lock()
            .expect("telemetry attempt store is not poisoned")
            .clear();
        self.requests
            .lock()
            .expect("telemetry request store is not poisoned")
            .clear();
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn record(&self, attempt: &ServiceAttempt) {
        self.attempts
            .lock()
            .expect("telemetry attempt store is not poisoned")
            .push(attempt.clone());
    }

    fn record_request(&self, summary: &RequestSummary) {
        self.requests
            .lock()
            .expect("telemetry request store is not poisoned")
            .push(summary.clone());
    }
}

/// Emits records as structured `tracing` events on `firerisk::telemetry`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, attempt: &ServiceAttempt) {
        info!(
            target: TELEMETRY_TARGET,
            step = %attempt.step,
            attempted = attempt.attempted,
            succeeded = attempt.succeeded,
            elapsed_ms = ?attempt.elapsed_ms,
            skip_reason = attempt.skip_reason.map(SkipReason::as_str),
            failure = attempt.failure.as_ref().map(FailureReason::kind),
            origin = attempt.origin.map(ProviderId::as_str),
            "fallback step"
        );
    }

    fn record_request(&self, summary: &RequestSummary) {
        info!(
            target: TELEMETRY_TARGET,
            request_id = %summary.request_id,
            location = %summary.location,
            source = %summary.source,
            freshness = %summary.freshness,
            level = %summary.level,
            steps = summary.attempts.len(),
            total_elapsed_ms = summary.total_elapsed_ms,
            "risk request completed"
        );
    }
}

/// Forwards records to a sink, containing any panic it raises.
#[derive(Clone)]
pub struct TelemetryRecorder {
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryRecorder {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub fn record_attempts(&self, attempts: &[ServiceAttempt]) {
        for attempt in attempts {
            if catch_unwind(AssertUnwindSafe(|| self.sink.record(attempt))).is_err() {
                warn!(step = %attempt.step, "telemetry sink panicked while recording a step");
            }
        }
    }

    pub fn record_request(&self, summary: &RequestSummary) {
        if catch_unwind(AssertUnwindSafe(|| self.sink.record_request(summary))).is_err() {
            warn!(
                request_id = %summary.request_id,
                "telemetry sink panicked while recording a request"
            );
        }
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new(Arc::new(NoopTelemetrySink))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
