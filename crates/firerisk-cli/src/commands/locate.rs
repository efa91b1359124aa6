use firerisk_core::{GeographicContext, OrchestratorConfig};
use serde::Serialize;
use serde_json::Value;

use crate::cli::CoordinateArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct LocateResponseData {
    location: String,
    in_region: bool,
    cache_key: String,
}

pub fn run(args: &CoordinateArgs, config: &OrchestratorConfig) -> Result<Value, CliError> {
    let context = GeographicContext::build(args.lat, args.lon, config.region())?;

    Ok(serde_json::to_value(LocateResponseData {
        location: context.redacted(),
        in_region: context.in_region(),
        cache_key: context.cache_key().to_string(),
    })?)
}
