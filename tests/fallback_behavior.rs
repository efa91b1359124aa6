//! Behavior-driven tests for the fallback chain
//!
//! These tests verify HOW a request moves through primary, secondary, cache
//! and mock steps, what each step records, and that nothing past coordinate
//! validation can fail a request.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use firerisk_core::cache::CacheFuture;
use firerisk_core::{
    log_redact, CacheError, CacheKey, CacheLookup, CacheStore, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, Clock, EffisSource, FailureReason, FallbackOrchestrator,
    FetchFuture, Freshness, HttpClient, HttpError, HttpRequest, HttpResponse,
    InMemoryTelemetrySink, ManualClock, MemoryBackend, MockStrategy, OrchestratorConfig,
    ProviderId, RequestSummary, RiskAssessment, RiskLevel, RiskSource, ServiceAttempt,
    SkipReason, SourceError, TelemetrySink, TtlCacheStore, UtcDateTime, ValidationError,
};

const EDINBURGH: (f64, f64) = (55.9533, -3.1883);
const NEW_YORK: (f64, f64) = (40.7128, -74.0060);

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Script {
    Succeed(f64),
    Fail,
    Hang,
    Panic,
}

/// Live source that follows a fixed script and counts its calls.
struct ScriptedSource {
    id: ProviderId,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(id: ProviderId, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RiskSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn fetch<'a>(&'a self, _lat: f64, _lon: f64) -> FetchFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (id, script) = (self.id, self.script);
        Box::pin(async move {
            match script {
                Script::Succeed(fwi) => Ok(RiskAssessment::live(id, fwi, UtcDateTime::now())?),
                Script::Fail => Err(SourceError::unavailable(format!("{id} returned status 503"))),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(SourceError::unavailable("unreachable"))
                }
                Script::Panic => panic!("{id} adapter bug"),
            }
        })
    }
}

/// Transport whose requests never complete.
#[derive(Default)]
struct UnresponsiveHttpClient {
    requests: AtomicUsize,
}

impl HttpClient for UnresponsiveHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(HttpError::new("unreachable"))
        })
    }
}

/// Cache store whose backend is down.
#[derive(Default)]
struct BrokenCacheStore {
    lookups: AtomicUsize,
}

impl CacheStore for BrokenCacheStore {
    fn lookup<'a>(&'a self, _key: &'a CacheKey) -> CacheFuture<'a, CacheLookup> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
    }

    fn store<'a>(
        &'a self,
        _key: &'a CacheKey,
        _assessment: &'a RiskAssessment,
    ) -> CacheFuture<'a, ()> {
        Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
    }
}

/// Cache store that never answers.
struct StalledCacheStore;

impl CacheStore for StalledCacheStore {
    fn lookup<'a>(&'a self, _key: &'a CacheKey) -> CacheFuture<'a, CacheLookup> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CacheLookup::Empty)
        })
    }

    fn store<'a>(
        &'a self,
        _key: &'a CacheKey,
        _assessment: &'a RiskAssessment,
    ) -> CacheFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

struct PanickingSink;

impl TelemetrySink for PanickingSink {
    fn record(&self, _attempt: &ServiceAttempt) {
        panic!("telemetry exporter crashed");
    }

    fn record_request(&self, _summary: &RequestSummary) {
        panic!("telemetry exporter crashed");
    }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default().with_step_timeouts(
        Duration::from_millis(100),
        Duration::from_millis(100),
        Duration::from_millis(100),
    )
}

struct Harness {
    orchestrator: FallbackOrchestrator,
    primary: Arc<ScriptedSource>,
    secondary: Arc<ScriptedSource>,
    telemetry: Arc<InMemoryTelemetrySink>,
}

fn harness(primary: Script, secondary: Script) -> Harness {
    harness_with(fast_config(), primary, secondary, None)
}

fn harness_with(
    config: OrchestratorConfig,
    primary: Script,
    secondary: Script,
    cache: Option<Arc<dyn CacheStore>>,
) -> Harness {
    let primary = ScriptedSource::new(ProviderId::Effis, primary);
    let secondary = ScriptedSource::new(ProviderId::Sepa, secondary);
    let telemetry = Arc::new(InMemoryTelemetrySink::new());

    let mut builder = FallbackOrchestrator::builder(config)
        .with_primary(primary.clone())
        .with_secondary(secondary.clone())
        .with_telemetry_sink(telemetry.clone());
    if let Some(cache) = cache {
        builder = builder.with_cache_store(cache);
    }

    Harness {
        orchestrator: builder.build().expect("valid configuration"),
        primary,
        secondary,
        telemetry,
    }
}

fn steps(attempts: &[ServiceAttempt]) -> Vec<ProviderId> {
    attempts.iter().map(ServiceAttempt::step).collect()
}

// =============================================================================
// Fallback chain: Primary and Secondary
// =============================================================================

#[tokio::test]
async fn when_primary_succeeds_for_edinburgh_system_returns_live_primary_result() {
    // Given: A working primary source
    let h = harness(Script::Succeed(23.4), Script::Fail);

    // When: The system resolves the risk for Edinburgh
    let assessment = h
        .orchestrator
        .get_current(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The live primary result is returned and only one step is recorded
    assert_eq!(assessment.source(), ProviderId::Effis);
    assert_eq!(assessment.freshness(), Freshness::Live);
    assert_eq!(assessment.level(), RiskLevel::High);
    assert_eq!(assessment.fwi(), Some(23.4));

    let attempts = h.telemetry.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].step(), ProviderId::Effis);
    assert!(attempts[0].attempted());
    assert!(attempts[0].is_success());
    assert_eq!(h.secondary.calls(), 0);
}

#[tokio::test]
async fn when_primary_times_out_in_region_system_returns_secondary_result() {
    // Given: A primary that never answers and a working secondary
    let h = harness(Script::Hang, Script::Succeed(8.5));

    // When: The system resolves the risk for an in-region coordinate
    let started = Instant::now();
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The secondary result is served after the primary step times out
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.assessment.source(), ProviderId::Sepa);
    assert_eq!(outcome.assessment.freshness(), Freshness::Live);
    assert_eq!(outcome.assessment.level(), RiskLevel::Low);

    assert_eq!(steps(&outcome.attempts), vec![ProviderId::Effis, ProviderId::Sepa]);
    let primary = &outcome.attempts[0];
    assert!(primary.attempted());
    assert!(!primary.is_success());
    assert_eq!(
        primary.failure(),
        Some(&FailureReason::Timeout { budget_ms: 100 })
    );
    assert!(outcome.attempts[1].is_success());
}

#[tokio::test]
async fn when_primary_fails_for_out_of_region_point_system_skips_secondary_and_serves_mock() {
    // Given: A failing primary and an empty cache
    let h = harness(Script::Fail, Script::Succeed(8.5));

    // When: The system resolves the risk for New York
    let outcome = h
        .orchestrator
        .evaluate(NEW_YORK.0, NEW_YORK.1, None)
        .await
        .expect("valid coordinate");

    // Then: The mock answers and the secondary is never called
    assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    assert_eq!(outcome.assessment.freshness(), Freshness::Synthetic);
    assert_eq!(outcome.assessment.level(), RiskLevel::Moderate);
    assert_eq!(h.secondary.calls(), 0);

    assert_eq!(
        steps(&outcome.attempts),
        vec![ProviderId::Effis, ProviderId::Sepa, ProviderId::Cache, ProviderId::Mock]
    );
    let primary = &outcome.attempts[0];
    assert_eq!(primary.failure().map(FailureReason::kind), Some("upstream"));

    let secondary = &outcome.attempts[1];
    assert!(!secondary.attempted());
    assert_eq!(secondary.skip_reason(), Some(SkipReason::OutOfRegion));
    assert_eq!(secondary.elapsed_ms(), None);

    let cache = &outcome.attempts[2];
    assert!(!cache.attempted());
    assert_eq!(cache.skip_reason(), Some(SkipReason::CacheEmpty));

    assert!(outcome.attempts[3].is_success());
}

#[tokio::test]
async fn when_a_source_panics_system_records_failure_and_moves_on() {
    // Given: A primary adapter that panics
    let h = harness(Script::Panic, Script::Succeed(30.0));

    // When: The system resolves the risk in region
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The panic is contained and recorded as an internal failure
    assert_eq!(outcome.assessment.source(), ProviderId::Sepa);
    match outcome.attempts[0].failure() {
        Some(FailureReason::Upstream { code, .. }) => assert_eq!(code, "source.internal"),
        other => panic!("expected upstream failure, got {other:?}"),
    }
}

// =============================================================================
// Fallback chain: Circuit breaking
// =============================================================================

#[tokio::test]
async fn when_primary_keeps_timing_out_system_stops_calling_it() {
    // Given: A primary whose upstream never answers, guarded by a breaker
    //        that opens on the first failure
    let transport = Arc::new(UnresponsiveHttpClient::default());
    let breaker = Arc::new(CircuitBreaker::new(
        ProviderId::Effis,
        CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(60),
        },
    ));
    let primary = EffisSource::with_http_client(transport.clone())
        .with_circuit_breaker(breaker.clone());
    let config = OrchestratorConfig::default().with_step_timeouts(
        Duration::from_millis(50),
        Duration::from_millis(50),
        Duration::from_millis(50),
    );
    let orchestrator = FallbackOrchestrator::builder(config)
        .with_primary(Arc::new(primary))
        .with_secondary(ScriptedSource::new(ProviderId::Sepa, Script::Fail))
        .build()
        .expect("valid configuration");

    // When: Three requests arrive one after another
    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(
            orchestrator
                .evaluate(NEW_YORK.0, NEW_YORK.1, None)
                .await
                .expect("valid coordinate"),
        );
    }

    // Then: Only the first request reaches the upstream
    assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(
        outcomes[0].attempts[0].failure(),
        Some(&FailureReason::Timeout { budget_ms: 50 })
    );

    // And: Later requests fail fast instead of waiting out the step
    for outcome in &outcomes[1..] {
        assert_eq!(outcome.assessment.source(), ProviderId::Mock);
        assert_eq!(
            outcome.attempts[0].failure().map(FailureReason::kind),
            Some("upstream")
        );
    }
}

// =============================================================================
// Fallback chain: Cache
// =============================================================================

#[tokio::test]
async fn when_both_live_sources_fail_system_serves_cached_result_with_origin() {
    // Given: A cache holding an earlier secondary result for the same cell
    let cache = Arc::new(TtlCacheStore::new(MemoryBackend::new(), Duration::from_secs(3600)));
    let stored = RiskAssessment::live(ProviderId::Sepa, 42.0, UtcDateTime::now()).expect("valid");
    cache
        .store(&CacheKey::for_coordinates(EDINBURGH.0, EDINBURGH.1), &stored)
        .await
        .expect("store succeeds");
    let h = harness_with(fast_config(), Script::Fail, Script::Fail, Some(cache));

    // When: Both live sources fail
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The cached value is served tagged as cached, and the mock is not reached
    assert_eq!(outcome.assessment.source(), ProviderId::Cache);
    assert_eq!(outcome.assessment.freshness(), Freshness::Cached);
    assert_eq!(outcome.assessment.level(), RiskLevel::VeryHigh);
    assert_eq!(outcome.assessment.observed_at(), stored.observed_at());
    assert_eq!(outcome.assessment.fwi(), None);

    assert_eq!(
        steps(&outcome.attempts),
        vec![ProviderId::Effis, ProviderId::Sepa, ProviderId::Cache]
    );
    assert!(!outcome.attempts[0].is_success());
    assert!(!outcome.attempts[1].is_success());
    assert!(outcome.attempts[2].is_success());
    assert_eq!(outcome.attempts[2].origin(), Some(ProviderId::Sepa));
}

#[tokio::test]
async fn when_live_source_succeeds_system_writes_result_to_cache() {
    // Given: A working primary and a shared cache
    let cache = Arc::new(TtlCacheStore::new(MemoryBackend::new(), Duration::from_secs(3600)));
    let h = harness_with(fast_config(), Script::Succeed(12.0), Script::Fail, Some(cache.clone()));

    // When: A request succeeds and pending writes are flushed
    h.orchestrator
        .get_current(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");
    h.orchestrator.flush_cache_writes().await;

    // Then: The live result is in the cache under the coordinate's cell
    let lookup = cache
        .lookup(&CacheKey::for_coordinates(EDINBURGH.0, EDINBURGH.1))
        .await
        .expect("lookup succeeds");
    let entry = lookup.into_entry().expect("entry was written");
    assert_eq!(entry.assessment().source(), ProviderId::Effis);
    assert_eq!(entry.assessment().level(), RiskLevel::Moderate);
}

#[tokio::test]
async fn when_mock_answers_system_does_not_cache_synthetic_result() {
    // Given: Both live sources failing and an empty cache
    let cache = Arc::new(TtlCacheStore::new(MemoryBackend::new(), Duration::from_secs(3600)));
    let h = harness_with(fast_config(), Script::Fail, Script::Fail, Some(cache.clone()));

    // When: Two requests run for the same cell
    for _ in 0..2 {
        let outcome = h
            .orchestrator
            .evaluate(EDINBURGH.0, EDINBURGH.1, None)
            .await
            .expect("valid coordinate");
        assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    }
    h.orchestrator.flush_cache_writes().await;

    // Then: Nothing was stored
    assert!(cache.backend().is_empty().await);
}

#[tokio::test]
async fn when_cache_entry_has_expired_system_falls_through_to_mock() {
    // Given: A cache entry whose TTL has elapsed on the injected clock
    let clock = Arc::new(ManualClock::new(
        UtcDateTime::parse("2024-07-01T12:00:00Z").expect("valid"),
    ));
    let ttl = Duration::from_secs(6 * 60 * 60);
    let cache = Arc::new(TtlCacheStore::new(MemoryBackend::new(), ttl).with_clock(clock.clone()));
    let stored = RiskAssessment::live(ProviderId::Effis, 60.0, clock.now()).expect("valid");
    cache
        .store(&CacheKey::for_coordinates(EDINBURGH.0, EDINBURGH.1), &stored)
        .await
        .expect("store succeeds");
    clock.advance(ttl);
    let h = harness_with(fast_config(), Script::Fail, Script::Fail, Some(cache));

    // When: Both live sources fail
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The expired entry is reported as a skip and the mock answers
    assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    assert_eq!(
        outcome.attempts[2].skip_reason(),
        Some(SkipReason::CacheExpired)
    );
}

#[tokio::test]
async fn when_cache_backend_errors_system_records_failed_cache_step() {
    // Given: A cache whose backend is down
    let cache = Arc::new(BrokenCacheStore::default());
    let h = harness_with(fast_config(), Script::Fail, Script::Fail, Some(cache.clone()));

    // When: Both live sources fail
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The cache step is attempted and failed, and the mock answers
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    let cache_step = &outcome.attempts[2];
    assert!(cache_step.attempted());
    assert_eq!(cache_step.failure().map(FailureReason::kind), Some("cache"));
}

#[tokio::test]
async fn when_cache_write_fails_system_still_returns_live_result() {
    // Given: A working primary and a cache that rejects writes
    let h = harness_with(
        fast_config(),
        Script::Succeed(3.0),
        Script::Fail,
        Some(Arc::new(BrokenCacheStore::default())),
    );

    // When: The request succeeds and the failed write is flushed
    let assessment = h
        .orchestrator
        .get_current(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");
    h.orchestrator.flush_cache_writes().await;

    // Then: The write failure is invisible to the caller and to step telemetry
    assert_eq!(assessment.source(), ProviderId::Effis);
    assert_eq!(assessment.level(), RiskLevel::VeryLow);
    assert_eq!(h.telemetry.attempts().len(), 1);
}

#[tokio::test]
async fn when_cache_lookup_stalls_system_times_out_the_step() {
    // Given: A cache that never answers
    let h = harness_with(
        fast_config(),
        Script::Fail,
        Script::Fail,
        Some(Arc::new(StalledCacheStore)),
    );

    // When: Both live sources fail
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The cache step is recorded as a timeout and the mock answers
    assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    assert_eq!(
        outcome.attempts[2].failure(),
        Some(&FailureReason::Timeout { budget_ms: 100 })
    );
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn when_latitude_is_out_of_range_system_rejects_without_calling_collaborators() {
    // Given: Sources that would succeed
    let h = harness(Script::Succeed(10.0), Script::Succeed(10.0));

    // When: The system is asked about latitude 91
    let result = h.orchestrator.get_current(91.0, 0.0, None).await;

    // Then: A validation error is returned and nothing else happens
    assert_eq!(result, Err(ValidationError::LatitudeOutOfRange));
    assert_eq!(h.primary.calls(), 0);
    assert_eq!(h.secondary.calls(), 0);
    assert!(h.telemetry.attempts().is_empty());
    assert!(h.telemetry.requests().is_empty());
}

#[tokio::test]
async fn when_coordinates_are_not_finite_system_rejects_them() {
    let h = harness(Script::Succeed(10.0), Script::Succeed(10.0));

    for (lat, lon) in [
        (f64::NAN, 0.0),
        (0.0, f64::NAN),
        (f64::INFINITY, 0.0),
        (0.0, f64::NEG_INFINITY),
        (-90.5, 0.0),
        (0.0, 180.01),
    ] {
        let result = h.orchestrator.get_current(lat, lon, None).await;
        assert!(result.is_err(), "({lat}, {lon}) should be rejected");
    }

    assert_eq!(h.primary.calls(), 0);
    assert!(h.telemetry.attempts().is_empty());
}

// =============================================================================
// Never-fail and deadline
// =============================================================================

#[tokio::test]
async fn when_every_collaborator_fails_system_still_returns_an_assessment() {
    // Given: Every combination of broken sources with a broken cache
    let scripts = [Script::Fail, Script::Hang, Script::Panic];

    for primary in scripts {
        for secondary in scripts {
            let h = harness_with(
                fast_config(),
                primary,
                secondary,
                Some(Arc::new(BrokenCacheStore::default())),
            );

            // When: Requests run in and out of region
            for (lat, lon) in [EDINBURGH, NEW_YORK, (-90.0, 180.0)] {
                let assessment = h
                    .orchestrator
                    .get_current(lat, lon, None)
                    .await
                    .expect("valid coordinate");

                // Then: A synthetic assessment is always produced
                assert_eq!(assessment.source(), ProviderId::Mock);
                assert_eq!(assessment.freshness(), Freshness::Synthetic);
            }
        }
    }
}

#[tokio::test]
async fn when_deadline_is_exhausted_system_skips_remaining_steps_and_serves_mock() {
    // Given: A primary that hangs past a short request deadline
    let config = OrchestratorConfig::default();
    let h = harness_with(config, Script::Hang, Script::Succeed(10.0), None);

    // When: The request runs with a 60 ms deadline
    let started = Instant::now();
    let outcome = h
        .orchestrator
        .evaluate(EDINBURGH.0, EDINBURGH.1, Some(Duration::from_millis(60)))
        .await
        .expect("valid coordinate");

    // Then: The primary is cut at the deadline and later steps are skipped
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.assessment.source(), ProviderId::Mock);
    match outcome.attempts[0].failure() {
        Some(FailureReason::Timeout { budget_ms }) => assert!(*budget_ms <= 60),
        other => panic!("expected primary timeout, got {other:?}"),
    }
    assert_eq!(
        outcome.attempts[1].skip_reason(),
        Some(SkipReason::DeadlineExceeded)
    );
    assert_eq!(
        outcome.attempts[2].skip_reason(),
        Some(SkipReason::DeadlineExceeded)
    );
    assert!(outcome.attempts[3].is_success());
    assert_eq!(h.secondary.calls(), 0);
}

#[tokio::test]
async fn when_telemetry_sink_panics_system_still_answers() {
    // Given: A telemetry sink that panics on every record
    let primary = ScriptedSource::new(ProviderId::Effis, Script::Succeed(15.0));
    let orchestrator = FallbackOrchestrator::builder(fast_config())
        .with_primary(primary)
        .with_secondary(ScriptedSource::new(ProviderId::Sepa, Script::Fail))
        .with_telemetry_sink(Arc::new(PanickingSink))
        .build()
        .expect("valid configuration");

    // When: The system resolves a request
    let assessment = orchestrator
        .get_current(EDINBURGH.0, EDINBURGH.1, None)
        .await
        .expect("valid coordinate");

    // Then: The request is unaffected
    assert_eq!(assessment.source(), ProviderId::Effis);
}

// =============================================================================
// Mock strategy
// =============================================================================

#[tokio::test]
async fn when_keyed_mock_strategy_is_configured_system_answers_deterministically() {
    // Given: A keyed mock strategy with no live data available
    let config = fast_config().with_mock_strategy(MockStrategy::Keyed);
    let h = harness_with(config, Script::Fail, Script::Fail, None);

    // When: The same coordinate is resolved twice
    let first = h
        .orchestrator
        .get_current(NEW_YORK.0, NEW_YORK.1, None)
        .await
        .expect("valid coordinate");
    let second = h
        .orchestrator
        .get_current(NEW_YORK.0, NEW_YORK.1, None)
        .await
        .expect("valid coordinate");

    // Then: Both answers carry the same level
    assert_eq!(first.source(), ProviderId::Mock);
    assert_eq!(first.level(), second.level());
    assert_eq!(first.level(), RiskLevel::High);
}

// =============================================================================
// Telemetry and privacy
// =============================================================================

#[tokio::test]
async fn when_request_completes_system_emits_redacted_summary_after_step_records() {
    // Given: A failing primary and a working secondary
    let h = harness(Script::Fail, Script::Succeed(8.5));

    // When: The system resolves a full-precision coordinate
    let outcome = h
        .orchestrator
        .evaluate(55.953_312, -3.188_267, None)
        .await
        .expect("valid coordinate");

    // Then: Step records match the outcome and the summary is redacted
    assert_eq!(h.telemetry.attempts(), outcome.attempts);
    let requests = h.telemetry.requests();
    assert_eq!(requests.len(), 1);

    let summary = &requests[0];
    assert_eq!(summary.request_id, outcome.request_id);
    assert_eq!(summary.location, "55.95,-3.19");
    assert_eq!(summary.source, ProviderId::Sepa);
    assert_eq!(summary.freshness, Freshness::Live);
    assert_eq!(summary.attempts.len(), 2);

    let serialized = serde_json::to_string(summary).expect("serializable");
    assert!(!serialized.contains("55.9533"));
    assert!(!serialized.contains("3.1882"));
}

#[test]
fn when_redaction_is_reapplied_system_output_is_unchanged() {
    for (lat, lon) in [
        EDINBURGH,
        NEW_YORK,
        (-33.868_82, 151.209_29),
        (0.004_9, -0.005_1),
        (89.999_9, -179.999_9),
    ] {
        let once = log_redact(lat, lon);
        let (lat_text, lon_text) = once.split_once(',').expect("comma separated");
        for part in [lat_text, lon_text] {
            let decimals = part.split_once('.').map_or(0, |(_, fraction)| fraction.len());
            assert!(decimals <= 2, "{once} has more than two decimals");
        }

        let twice = log_redact(
            lat_text.parse().expect("numeric latitude"),
            lon_text.parse().expect("numeric longitude"),
        );
        assert_eq!(once, twice);
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn when_requests_run_concurrently_system_answers_each_independently() {
    // Given: One orchestrator shared by many tasks
    let h = harness(Script::Succeed(20.0), Script::Fail);

    // When: Requests run in parallel for in- and out-of-region points
    let mut handles = Vec::new();
    for index in 0..24 {
        let orchestrator = h.orchestrator.clone();
        let (lat, lon) = if index % 2 == 0 { EDINBURGH } else { NEW_YORK };
        handles.push(tokio::spawn(async move {
            orchestrator.evaluate(lat, lon, None).await
        }));
    }

    // Then: Every request succeeds with its own id and a single step
    let mut ids = Vec::new();
    for handle in handles {
        let outcome = handle
            .await
            .expect("task completes")
            .expect("valid coordinate");
        assert_eq!(outcome.assessment.source(), ProviderId::Effis);
        assert_eq!(outcome.attempts.len(), 1);
        ids.push(outcome.request_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 24);
    assert_eq!(h.primary.calls(), 24);
    assert_eq!(h.telemetry.requests().len(), 24);
}
