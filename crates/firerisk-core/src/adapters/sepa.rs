use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::execute_guarded;
use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::{FetchFuture, RiskSource, SourceError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{ProviderId, RiskAssessment, UtcDateTime};

/// Regional fire danger feed queried for region-eligible coordinates.
///
/// Expects `GET {base_url}?lat=..&lon=..` to answer
/// `{"fwi": <number>, "observed_at": "<rfc3339>"}`.
#[derive(Clone)]
pub struct SepaSource {
    base_url: String,
    auth: HttpAuth,
    timeout_ms: u64,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl SepaSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: HttpAuth::None,
            timeout_ms: 2_000,
            http_client: Arc::new(ReqwestHttpClient::new()),
            circuit_breaker: Arc::new(CircuitBreaker::with_defaults(ProviderId::Sepa)),
        }
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    fn request_url(&self, lat: f64, lon: f64) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}lat={lat:.4}&lon={lon:.4}", self.base_url)
    }
}

impl RiskSource for SepaSource {
    fn id(&self) -> ProviderId {
        ProviderId::Sepa
    }

    fn fetch<'a>(&'a self, lat: f64, lon: f64) -> FetchFuture<'a> {
        Box::pin(async move {
            let request = HttpRequest::get(self.request_url(lat, lon))
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms);

            let body = execute_guarded(
                ProviderId::Sepa,
                self.http_client.as_ref(),
                &self.circuit_breaker,
                request,
            )
            .await?;

            let payload: SepaPayload = serde_json::from_str(&body).map_err(|error| {
                SourceError::invalid_response(format!("sepa payload is malformed: {error}"))
            })?;

            let observed_at = match payload.observed_at {
                Some(value) => UtcDateTime::parse(&value)?,
                None => UtcDateTime::now(),
            };
            RiskAssessment::live(ProviderId::Sepa, payload.fwi, observed_at)
                .map_err(SourceError::from)
        })
    }

    fn step_timed_out(&self, budget: Duration) {
        self.circuit_breaker.record_timeout(budget);
    }
}

#[derive(Debug, Deserialize)]
struct SepaPayload {
    fwi: f64,
    #[serde(default)]
    observed_at: Option<String>,
}
