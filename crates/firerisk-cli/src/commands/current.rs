use std::time::Duration;

use firerisk_core::{FallbackOrchestrator, RiskAssessment, ServiceAttempt};
use serde::Serialize;
use serde_json::Value;

use crate::cli::CurrentArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct CurrentResponseData<'a> {
    assessment: &'a RiskAssessment,
    attempts: &'a [ServiceAttempt],
}

pub async fn run(
    args: &CurrentArgs,
    orchestrator: &FallbackOrchestrator,
) -> Result<Value, CliError> {
    let deadline = args.deadline_ms.map(Duration::from_millis);
    let outcome = orchestrator
        .evaluate(args.coordinate.lat, args.coordinate.lon, deadline)
        .await?;
    orchestrator.flush_cache_writes().await;

    Ok(serde_json::to_value(CurrentResponseData {
        assessment: &outcome.assessment,
        attempts: &outcome.attempts,
    })?)
}
