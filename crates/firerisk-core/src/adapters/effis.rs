use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{execute_guarded, numeric_value};
use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::{FetchFuture, RiskSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{ProviderId, RiskAssessment, UtcDateTime};

const DEFAULT_BASE_URL: &str = "https://maps.effis.emergency.copernicus.eu/gwis";
const DEFAULT_LAYER: &str = "ecmwf007.fwi";
/// Half-width in degrees of the query box centred on the point.
const BBOX_HALF_SPAN: f64 = 0.01;
const VALUE_PROPERTIES: [&str; 3] = ["value", "fwi", "GRAY_INDEX"];

/// EFFIS Fire Weather Index adapter using WMS `GetFeatureInfo`.
#[derive(Clone)]
pub struct EffisSource {
    base_url: String,
    layer: String,
    timeout_ms: u64,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for EffisSource {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            layer: String::from(DEFAULT_LAYER),
            timeout_ms: 3_000,
            http_client: Arc::new(ReqwestHttpClient::new()),
            circuit_breaker: Arc::new(CircuitBreaker::with_defaults(ProviderId::Effis)),
        }
    }
}

impl EffisSource {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
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

    fn request_url(&self, lat: f64, lon: f64, today: &str) -> String {
        // WMS 1.3.0 with EPSG:4326 orders the bbox as lat,lon.
        let bbox = format!(
            "{:.4},{:.4},{:.4},{:.4}",
            lat - BBOX_HALF_SPAN,
            lon - BBOX_HALF_SPAN,
            lat + BBOX_HALF_SPAN,
            lon + BBOX_HALF_SPAN
        );
        let layer = urlencoding::encode(&self.layer);
        format!(
            "{base}?SERVICE=WMS&VERSION=1.3.0&REQUEST=GetFeatureInfo\
             &LAYERS={layer}&QUERY_LAYERS={layer}&CRS=EPSG:4326&BBOX={bbox}\
             &WIDTH=3&HEIGHT=3&I=1&J=1&INFO_FORMAT={format}&TIME={today}",
            base = self.base_url,
            bbox = urlencoding::encode(&bbox),
            format = urlencoding::encode("application/json"),
        )
    }
}

impl RiskSource for EffisSource {
    fn id(&self) -> ProviderId {
        ProviderId::Effis
    }

    fn fetch<'a>(&'a self, lat: f64, lon: f64) -> FetchFuture<'a> {
        Box::pin(async move {
            let now = UtcDateTime::now();
            let today = now.into_inner().date().to_string();
            let request = HttpRequest::get(self.request_url(lat, lon, &today))
                .with_timeout_ms(self.timeout_ms);

            let body = execute_guarded(
                ProviderId::Effis,
                self.http_client.as_ref(),
                &self.circuit_breaker,
                request,
            )
            .await?;

            let payload = parse_feature_info(&body)?;
            let observed_at = payload.observed_at.unwrap_or(now);
            RiskAssessment::live(ProviderId::Effis, payload.fwi, observed_at)
                .map_err(SourceError::from)
        })
    }

    fn step_timed_out(&self, budget: Duration) {
        self.circuit_breaker.record_timeout(budget);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EffisPayload {
    fwi: f64,
    observed_at: Option<UtcDateTime>,
}

fn parse_feature_info(body: &str) -> Result<EffisPayload, SourceError> {
    let document: Value = serde_json::from_str(body).map_err(|error| {
        SourceError::invalid_response(format!("effis body is not json: {error}"))
    })?;

    let properties = document
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| features.first())
        .and_then(|feature| feature.get("properties"))
        .ok_or_else(|| SourceError::invalid_response("effis response contains no features"))?;

    let fwi = VALUE_PROPERTIES
        .iter()
        .find_map(|name| properties.get(*name).and_then(numeric_value))
        .ok_or_else(|| SourceError::invalid_response("effis feature has no numeric fwi value"))?;

    let observed_at = properties
        .get("time")
        .and_then(Value::as_str)
        .and_then(|value| UtcDateTime::parse(value).ok());

    Ok(EffisPayload { fwi, observed_at })
}
