use firerisk_core::orchestrator::ENV_SEPA_URL;
use firerisk_core::OrchestratorConfig;
use serde::Serialize;
use serde_json::Value;

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ConfigResponseData<'a> {
    orchestrator: &'a OrchestratorConfig,
    offline: bool,
    cache_backend: &'static str,
    secondary_endpoint_configured: bool,
}

pub fn run(cli: &Cli, config: &OrchestratorConfig) -> Result<Value, CliError> {
    let secondary_endpoint_configured = std::env::var(ENV_SEPA_URL)
        .map(|url| !url.trim().is_empty())
        .unwrap_or(false);

    Ok(serde_json::to_value(ConfigResponseData {
        orchestrator: config,
        offline: cli.offline,
        cache_backend: if cli.cache_db.is_some() { "duckdb" } else { "memory" },
        secondary_endpoint_configured,
    })?)
}
