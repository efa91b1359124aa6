mod config;
mod current;
mod locate;

use std::sync::Arc;

use firerisk_core::{
    DuckDbBackend, FallbackOrchestrator, FallbackOrchestratorBuilder, OrchestratorConfig,
    TtlCacheStore,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let config = OrchestratorConfig::from_env()?;

    match &cli.command {
        Command::Current(args) => {
            let orchestrator = build_orchestrator(cli, config)?;
            current::run(args, &orchestrator).await
        }
        Command::Locate(args) => locate::run(args, &config),
        Command::Config => config::run(cli, &config),
    }
}

fn build_orchestrator(
    cli: &Cli,
    config: OrchestratorConfig,
) -> Result<FallbackOrchestrator, CliError> {
    debug!(
        offline = cli.offline,
        persistent_cache = cli.cache_db.is_some(),
        "assembling orchestrator"
    );
    let cache_ttl = config.cache_ttl();
    let mut builder = FallbackOrchestratorBuilder::new(config);
    builder = if cli.offline {
        builder.with_offline_mode()
    } else {
        builder.with_real_clients()
    };

    if let Some(path) = &cli.cache_db {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let backend = DuckDbBackend::open(path)?;
        builder = builder.with_cache_store(Arc::new(TtlCacheStore::new(backend, cache_ttl)));
    }

    Ok(builder.build()?)
}
