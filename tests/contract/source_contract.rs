use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use firerisk_core::{
    CircuitBreaker, CircuitBreakerConfig, EffisSource, Freshness, HttpAuth, HttpClient, HttpError,
    HttpRequest, HttpResponse, ProviderId, RiskLevel, RiskSource, SepaSource, SourceErrorKind,
};

/// Transport returning one canned response and keeping every request.
struct CannedHttpClient {
    response: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("request log lock").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("request log lock").push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

struct SourceCase {
    id: ProviderId,
    /// A well-formed body carrying an FWI of 30.5.
    valid_body: &'static str,
    build: fn(Arc<dyn HttpClient>, Arc<CircuitBreaker>) -> Arc<dyn RiskSource>,
}

fn source_cases() -> Vec<SourceCase> {
    vec![
        SourceCase {
            id: ProviderId::Effis,
            valid_body: concat!(
                r#"{"type":"FeatureCollection","features":[{"type":"Feature","#,
                r#""properties":{"GRAY_INDEX":30.5,"time":"2024-07-01T00:00:00Z"}}]}"#
            ),
            build: |client, breaker| {
                Arc::new(
                    EffisSource::with_http_client(client)
                        .with_base_url("https://effis.test/wms")
                        .with_circuit_breaker(breaker),
                )
            },
        },
        SourceCase {
            id: ProviderId::Sepa,
            valid_body: r#"{"fwi":30.5,"observed_at":"2024-07-01T00:00:00Z"}"#,
            build: |client, breaker| {
                Arc::new(
                    SepaSource::new("https://sepa.test/fire-danger")
                        .with_http_client(client)
                        .with_auth(HttpAuth::BearerToken(String::from("secret")))
                        .with_circuit_breaker(breaker),
                )
            },
        },
    ]
}

fn breaker(id: ProviderId) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::with_defaults(id))
}

#[tokio::test]
async fn valid_payload_produces_live_assessment_for_all_sources() {
    for case in source_cases() {
        let client = CannedHttpClient::new(Ok(HttpResponse::ok_json(case.valid_body)));
        let source = (case.build)(client.clone(), breaker(case.id));

        let assessment = source
            .fetch(55.9533, -3.1883)
            .await
            .unwrap_or_else(|error| panic!("source '{}' fetch failed: {error}", case.id));

        assert_eq!(source.id(), case.id);
        assert_eq!(assessment.source(), case.id, "source '{}': tag", case.id);
        assert_eq!(assessment.freshness(), Freshness::Live);
        assert_eq!(assessment.level(), RiskLevel::High);
        assert_eq!(assessment.fwi(), Some(30.5));
        assert_eq!(
            assessment.observed_at().format_rfc3339(),
            "2024-07-01T00:00:00Z",
            "source '{}': observation time",
            case.id
        );
        assert_eq!(client.requests().len(), 1, "source '{}': one attempt", case.id);
    }
}

#[tokio::test]
async fn error_statuses_map_to_source_error_kinds_for_all_sources() {
    for case in source_cases() {
        for (status, expected) in [
            (429, SourceErrorKind::RateLimited),
            (500, SourceErrorKind::Unavailable),
            (503, SourceErrorKind::Unavailable),
            (404, SourceErrorKind::Unavailable),
        ] {
            let client = CannedHttpClient::new(Ok(HttpResponse::with_status(status, "")));
            let source = (case.build)(client.clone(), breaker(case.id));

            let error = source
                .fetch(55.9533, -3.1883)
                .await
                .expect_err("error status must fail");
            assert_eq!(
                error.kind(),
                expected,
                "source '{}': status {status}",
                case.id
            );
            assert_eq!(client.requests().len(), 1, "source '{}': no retry", case.id);
        }
    }
}

#[tokio::test]
async fn malformed_payload_is_an_invalid_response_for_all_sources() {
    for case in source_cases() {
        for body in ["not json", "{}", r#"{"fwi":"high"}"#, r#"{"features":[]}"#] {
            let client = CannedHttpClient::new(Ok(HttpResponse::ok_json(body)));
            let source = (case.build)(client, breaker(case.id));

            let error = source
                .fetch(55.9533, -3.1883)
                .await
                .expect_err("malformed payload must fail");
            assert_eq!(
                error.kind(),
                SourceErrorKind::InvalidResponse,
                "source '{}': body {body}",
                case.id
            );
        }
    }
}

#[tokio::test]
async fn transport_errors_do_not_leak_coordinates_for_all_sources() {
    for case in source_cases() {
        let client = CannedHttpClient::new(Err(HttpError::new("connection reset by peer")));
        let source = (case.build)(client.clone(), breaker(case.id));

        let error = source
            .fetch(55.953_312, -3.188_267)
            .await
            .expect_err("transport failure must fail");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(
            !error.to_string().contains("55.9"),
            "source '{}': error text carries a coordinate",
            case.id
        );
        assert_eq!(client.requests().len(), 1);
    }
}

#[tokio::test]
async fn open_circuit_fails_fast_for_all_sources() {
    for case in source_cases() {
        let client = CannedHttpClient::new(Ok(HttpResponse::with_status(503, "")));
        let breaker = Arc::new(CircuitBreaker::new(
            case.id,
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..CircuitBreakerConfig::default()
            },
        ));
        let source = (case.build)(client.clone(), breaker);

        for _ in 0..4 {
            let error = source
                .fetch(55.9533, -3.1883)
                .await
                .expect_err("upstream is down");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }

        assert_eq!(
            client.requests().len(),
            2,
            "source '{}': calls stop once the circuit opens",
            case.id
        );
    }
}

#[tokio::test]
async fn sepa_sends_coordinates_as_query_and_bearer_token() {
    let client = CannedHttpClient::new(Ok(HttpResponse::ok_json(r#"{"fwi":1.0}"#)));
    let source = SepaSource::new("https://sepa.test/fire-danger?region=scotland")
        .with_http_client(client.clone())
        .with_auth(HttpAuth::BearerToken(String::from("secret")));

    source.fetch(57.4778, -4.2247).await.expect("valid payload");

    let request = &client.requests()[0];
    assert_eq!(
        request.url,
        "https://sepa.test/fire-danger?region=scotland&lat=57.4778&lon=-4.2247"
    );
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("Bearer secret")
    );
}
