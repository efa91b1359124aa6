//! Live upstream adapters.
//!
//! | Adapter | Source tag | Role |
//! |---------|------------|------|
//! | [`EffisSource`] | `effis` | Primary, always attempted |
//! | [`SepaSource`] | `sepa` | Secondary, region-eligible coordinates only |
//!
//! Request URLs embed full-precision coordinates, so adapters never log them.

mod effis;
mod sepa;

pub use effis::EffisSource;
pub use sepa::SepaSource;

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::ProviderId;

/// Runs one guarded GET and returns the body of a successful response.
async fn execute_guarded(
    source: ProviderId,
    http_client: &dyn HttpClient,
    circuit_breaker: &CircuitBreaker,
    request: HttpRequest,
) -> Result<String, SourceError> {
    if !circuit_breaker.try_admit() {
        return Err(SourceError::unavailable(format!(
            "{source} circuit breaker is open; skipping upstream call"
        )));
    }

    let response = http_client.execute(request).await.map_err(|error| {
        circuit_breaker.record_failure();
        SourceError::unavailable(format!("{source} transport error: {}", error.message()))
    })?;

    if !response.is_success() {
        circuit_breaker.record_failure();
        let message = format!("{source} upstream returned status {}", response.status);
        return Err(if response.status == 429 {
            SourceError::rate_limited(message)
        } else {
            SourceError::unavailable(message)
        });
    }

    circuit_breaker.record_success();
    Ok(response.body)
}

/// Reads a number that upstreams may encode either as JSON number or string.
fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
