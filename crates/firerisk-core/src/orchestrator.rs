//! Ordered fallback chain: primary → secondary → cache → mock.
//!
//! Steps run strictly in sequence and stop at the first success. Every
//! upstream call runs in its own task under `min(step timeout, remaining
//! deadline)`; a step that times out, errors or panics is recorded and the
//! chain moves on. Only coordinate validation can fail a request.

use std::env;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{EffisSource, SepaSource};
use crate::cache::{CacheLookup, CacheStore, MemoryBackend, TtlCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::data_source::{RiskSource, SourceError};
use crate::http_client::{HttpClient, OfflineHttpClient, ReqwestHttpClient};
use crate::telemetry::{
    FailureReason, NoopTelemetrySink, RequestSummary, ServiceAttempt, SkipReason,
    TelemetryRecorder, TelemetrySink,
};
use crate::{
    ConfigError, GeographicContext, MockFallbackProvider, OrchestratorConfig, ProviderId,
    RiskAssessment, ValidationError,
};

/// Environment variable holding the secondary feed endpoint.
pub const ENV_SEPA_URL: &str = "FIRERISK_SEPA_URL";

/// Result of one request together with the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackOutcome {
    pub request_id: Uuid,
    pub assessment: RiskAssessment,
    pub attempts: Vec<ServiceAttempt>,
    pub total_elapsed_ms: u64,
}

/// Drives the fallback chain for each request.
///
/// One instance serves concurrent requests; the cache store is the only
/// state shared between them.
#[derive(Clone)]
pub struct FallbackOrchestrator {
    config: OrchestratorConfig,
    primary: Arc<dyn RiskSource>,
    secondary: Arc<dyn RiskSource>,
    cache: Arc<dyn CacheStore>,
    mock: MockFallbackProvider,
    telemetry: TelemetryRecorder,
    pending_writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FallbackOrchestrator {
    pub fn builder(config: OrchestratorConfig) -> FallbackOrchestratorBuilder {
        FallbackOrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the current risk for a coordinate.
    ///
    /// `deadline` overrides the configured overall deadline for this call.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for non-finite or out-of-range
    /// coordinates, before any collaborator is invoked. No other failure is
    /// ever surfaced.
    pub async fn get_current(
        &self,
        lat: f64,
        lon: f64,
        deadline: Option<Duration>,
    ) -> Result<RiskAssessment, ValidationError> {
        self.evaluate(lat, lon, deadline)
            .await
            .map(|outcome| outcome.assessment)
    }

    /// Like [`FallbackOrchestrator::get_current`] but also returns the step records.
    ///
    /// # Errors
    ///
    /// Same as [`FallbackOrchestrator::get_current`].
    pub async fn evaluate(
        &self,
        lat: f64,
        lon: f64,
        deadline: Option<Duration>,
    ) -> Result<FallbackOutcome, ValidationError> {
        let started = Instant::now();
        let context = GeographicContext::build(lat, lon, self.config.region()).map_err(|error| {
            debug!(%error, "rejected coordinate");
            error
        })?;

        let deadline_at = started + deadline.unwrap_or_else(|| self.config.deadline());
        let mut attempts = Vec::with_capacity(4);
        let assessment = self.run_chain(&context, deadline_at, &mut attempts).await;

        let outcome = FallbackOutcome {
            request_id: Uuid::new_v4(),
            assessment,
            attempts,
            total_elapsed_ms: elapsed_ms(started),
        };
        self.emit(&context, &outcome);
        Ok(outcome)
    }

    async fn run_chain(
        &self,
        context: &GeographicContext,
        deadline_at: Instant,
        attempts: &mut Vec<ServiceAttempt>,
    ) -> RiskAssessment {
        if let Some(assessment) = self
            .try_live(&self.primary, context, self.config.primary_timeout(), deadline_at, attempts)
            .await
        {
            self.spawn_cache_write(context, &assessment);
            return assessment;
        }

        if context.in_region() {
            if let Some(assessment) = self
                .try_live(
                    &self.secondary,
                    context,
                    self.config.secondary_timeout(),
                    deadline_at,
                    attempts,
                )
                .await
            {
                self.spawn_cache_write(context, &assessment);
                return assessment;
            }
        } else {
            debug!(location = %context.redacted(), "secondary skipped, out of region");
            attempts.push(ServiceAttempt::skipped(
                self.secondary.id(),
                SkipReason::OutOfRegion,
            ));
        }

        if let Some(assessment) = self.try_cache(context, deadline_at, attempts).await {
            return assessment;
        }

        let step_started = Instant::now();
        let assessment = self.mock.produce(context);
        attempts.push(ServiceAttempt::succeeded(
            ProviderId::Mock,
            step_started.elapsed(),
        ));
        assessment
    }

    async fn try_live(
        &self,
        source: &Arc<dyn RiskSource>,
        context: &GeographicContext,
        step_timeout: Duration,
        deadline_at: Instant,
        attempts: &mut Vec<ServiceAttempt>,
    ) -> Option<RiskAssessment> {
        let step = source.id();
        let Some(budget) = step_budget(step_timeout, deadline_at) else {
            debug!(%step, "deadline exhausted before step");
            attempts.push(ServiceAttempt::skipped(step, SkipReason::DeadlineExceeded));
            return None;
        };

        let step_started = Instant::now();
        let fetching = Arc::clone(source);
        let (lat, lon) = (context.lat(), context.lon());
        let mut task = AbortOnDrop(tokio::spawn(async move { fetching.fetch(lat, lon).await }));
        let result = tokio::time::timeout(budget, &mut task.0).await;
        let elapsed = step_started.elapsed();

        match result {
            Ok(Ok(Ok(assessment))) => {
                debug!(%step, elapsed_ms = elapsed.as_millis() as u64, "step succeeded");
                attempts.push(ServiceAttempt::succeeded(step, elapsed));
                Some(assessment)
            }
            Ok(Ok(Err(error))) => {
                debug!(%step, code = error.code(), "step failed");
                attempts.push(ServiceAttempt::failed(step, elapsed, upstream_failure(&error)));
                None
            }
            Ok(Err(join_error)) => {
                warn!(%step, "source task ended abnormally: {join_error}");
                let error =
                    SourceError::internal(format!("source task ended abnormally: {join_error}"));
                attempts.push(ServiceAttempt::failed(step, elapsed, upstream_failure(&error)));
                None
            }
            Err(_) => {
                debug!(%step, budget_ms = budget.as_millis() as u64, "step timed out");
                task.0.abort();
                source.step_timed_out(budget);
                attempts.push(ServiceAttempt::failed(
                    step,
                    elapsed,
                    FailureReason::Timeout {
                        budget_ms: elapsed_ms_of(budget),
                    },
                ));
                None
            }
        }
    }

    async fn try_cache(
        &self,
        context: &GeographicContext,
        deadline_at: Instant,
        attempts: &mut Vec<ServiceAttempt>,
    ) -> Option<RiskAssessment> {
        let step = ProviderId::Cache;
        let Some(budget) = step_budget(self.config.cache_timeout(), deadline_at) else {
            attempts.push(ServiceAttempt::skipped(step, SkipReason::DeadlineExceeded));
            return None;
        };

        let step_started = Instant::now();
        let result = tokio::time::timeout(budget, self.cache.lookup(context.cache_key())).await;
        let elapsed = step_started.elapsed();

        match result {
            Ok(Ok(CacheLookup::Hit(entry))) => {
                let origin = entry.assessment().source();
                debug!(cache_key = %context.cache_key(), %origin, "cache hit");
                attempts.push(ServiceAttempt::succeeded(step, elapsed).with_origin(origin));
                Some(entry.served_assessment())
            }
            Ok(Ok(CacheLookup::Expired)) => {
                attempts.push(ServiceAttempt::skipped(step, SkipReason::CacheExpired));
                None
            }
            Ok(Ok(CacheLookup::Empty)) => {
                attempts.push(ServiceAttempt::skipped(step, SkipReason::CacheEmpty));
                None
            }
            Ok(Err(error)) => {
                warn!(cache_key = %context.cache_key(), %error, "cache lookup failed");
                attempts.push(ServiceAttempt::failed(
                    step,
                    elapsed,
                    FailureReason::Cache {
                        message: error.to_string(),
                    },
                ));
                None
            }
            Err(_) => {
                attempts.push(ServiceAttempt::failed(
                    step,
                    elapsed,
                    FailureReason::Timeout {
                        budget_ms: elapsed_ms_of(budget),
                    },
                ));
                None
            }
        }
    }

    /// Waits for cache writes spawned by earlier requests.
    ///
    /// Requests never wait on their own write; short-lived callers such as
    /// a CLI invocation use this before exiting so the write is not lost.
    pub async fn flush_cache_writes(&self) {
        let handles = std::mem::take(
            &mut *self
                .pending_writes
                .lock()
                .expect("pending cache writes lock is not poisoned"),
        );
        for handle in handles {
            if let Err(error) = handle.await {
                warn!(%error, "cache write task ended abnormally");
            }
        }
    }

    /// Stores a live result without holding up the response.
    fn spawn_cache_write(&self, context: &GeographicContext, assessment: &RiskAssessment) {
        let cache = Arc::clone(&self.cache);
        let key = context.cache_key().clone();
        let assessment = assessment.clone();
        let handle = tokio::spawn(async move {
            if let Err(error) = cache.store(&key, &assessment).await {
                warn!(cache_key = %key, %error, "cache write failed");
            }
        });

        let mut pending = self
            .pending_writes
            .lock()
            .expect("pending cache writes lock is not poisoned");
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    fn emit(&self, context: &GeographicContext, outcome: &FallbackOutcome) {
        self.telemetry.record_attempts(&outcome.attempts);
        let summary = RequestSummary {
            request_id: outcome.request_id,
            location: context.redacted(),
            source: outcome.assessment.source(),
            freshness: outcome.assessment.freshness(),
            level: outcome.assessment.level(),
            attempts: outcome.attempts.clone(),
            total_elapsed_ms: outcome.total_elapsed_ms,
        };
        self.telemetry.record_request(&summary);

        info!(
            request_id = %outcome.request_id,
            location = %summary.location,
            source = %summary.source,
            level = %summary.level,
            steps = outcome.attempts.len(),
            elapsed_ms = outcome.total_elapsed_ms,
            "risk request served"
        );
    }
}

/// Assembles a [`FallbackOrchestrator`], filling unset collaborators with defaults.
///
/// # Environment Variables
///
/// | Variable | Used by |
/// |----------|---------|
/// | `FIRERISK_SEPA_URL` | [`FallbackOrchestratorBuilder::with_real_clients`] |
///
/// # Example
///
/// ```rust,ignore
/// use firerisk_core::{FallbackOrchestratorBuilder, OrchestratorConfig};
///
/// let orchestrator = FallbackOrchestratorBuilder::new(OrchestratorConfig::from_env()?)
///     .with_real_clients()
///     .build()?;
/// let assessment = orchestrator.get_current(55.9533, -3.1883, None).await?;
/// ```
pub struct FallbackOrchestratorBuilder {
    config: OrchestratorConfig,
    use_real_clients: bool,
    sepa_url: Option<String>,
    primary: Option<Arc<dyn RiskSource>>,
    secondary: Option<Arc<dyn RiskSource>>,
    cache: Option<Arc<dyn CacheStore>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    clock: Arc<dyn Clock>,
}

impl FallbackOrchestratorBuilder {
    /// Starts from `config` with offline sources, an in-memory cache and no telemetry.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            use_real_clients: false,
            sepa_url: None,
            primary: None,
            secondary: None,
            cache: None,
            telemetry: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses reqwest-backed adapters, reading the secondary endpoint from `FIRERISK_SEPA_URL`.
    pub fn with_real_clients(mut self) -> Self {
        self.use_real_clients = true;
        self.sepa_url = env::var(ENV_SEPA_URL).ok().filter(|url| !url.trim().is_empty());
        self
    }

    /// Keeps both live sources on a transport that refuses every request.
    pub fn with_offline_mode(mut self) -> Self {
        self.use_real_clients = false;
        self
    }

    pub fn with_sepa_url(mut self, url: impl Into<String>) -> Self {
        self.sepa_url = Some(url.into());
        self
    }

    pub fn with_primary(mut self, source: Arc<dyn RiskSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn RiskSource>) -> Self {
        self.secondary = Some(source);
        self
    }

    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Clock used by the default cache store and the mock provider.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn build(self) -> Result<FallbackOrchestrator, ConfigError> {
        self.config.validate()?;

        let http_client: Arc<dyn HttpClient> = if self.use_real_clients {
            Arc::new(ReqwestHttpClient::new())
        } else {
            Arc::new(OfflineHttpClient)
        };

        let primary = self.primary.unwrap_or_else(|| {
            Arc::new(
                EffisSource::with_http_client(Arc::clone(&http_client))
                    .with_timeout_ms(elapsed_ms_of(self.config.primary_timeout())),
            )
        });

        let secondary = match (self.secondary, self.sepa_url) {
            (Some(source), _) => source,
            (None, sepa_url) => {
                let transport: Arc<dyn HttpClient> = match (&sepa_url, self.use_real_clients) {
                    (Some(_), true) => Arc::clone(&http_client),
                    (None, true) => {
                        warn!("{ENV_SEPA_URL} is not set; secondary source will always fail");
                        Arc::new(OfflineHttpClient)
                    }
                    (_, false) => Arc::new(OfflineHttpClient),
                };
                Arc::new(
                    SepaSource::new(sepa_url.unwrap_or_default())
                        .with_http_client(transport)
                        .with_timeout_ms(elapsed_ms_of(self.config.secondary_timeout())),
                )
            }
        };

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(
                TtlCacheStore::new(MemoryBackend::new(), self.config.cache_ttl())
                    .with_clock(Arc::clone(&self.clock)),
            )
        });

        let telemetry = TelemetryRecorder::new(
            self.telemetry
                .unwrap_or_else(|| Arc::new(NoopTelemetrySink)),
        );

        let mock = MockFallbackProvider::new(self.config.mock_strategy()).with_clock(self.clock);

        Ok(FallbackOrchestrator {
            config: self.config,
            primary,
            secondary,
            cache,
            mock,
            telemetry,
            pending_writes: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

/// Aborts the wrapped task when the waiting request goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn step_budget(step_timeout: Duration, deadline_at: Instant) -> Option<Duration> {
    let remaining = deadline_at.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        None
    } else {
        Some(step_timeout.min(remaining))
    }
}

fn upstream_failure(error: &SourceError) -> FailureReason {
    FailureReason::Upstream {
        code: error.code().to_owned(),
        message: error.message().to_owned(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    elapsed_ms_of(started.elapsed())
}

fn elapsed_ms_of(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
