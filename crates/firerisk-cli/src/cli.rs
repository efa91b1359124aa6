//! CLI argument definitions for firerisk.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `current` | Resolve the current risk for a coordinate |
//! | `locate` | Show region eligibility and cache key for a coordinate |
//! | `config` | Print the effective configuration |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--offline` | `false` | Never contact live sources |
//! | `--cache-db` | none | Persist the cache in a DuckDB file |
//!
//! # Examples
//!
//! ```bash
//! firerisk current 55.9533 -3.1883 --pretty
//! firerisk --offline --cache-db ~/.firerisk/cache.duckdb current 57.48 -4.22
//! firerisk locate 40.7128 -74.0060
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Wildfire danger rating for a coordinate, with ordered source fallback.
#[derive(Debug, Parser)]
#[command(
    name = "firerisk",
    author,
    version,
    about = "Wildfire danger rating with ordered source fallback"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Replace both live sources with stubs that always fail.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// DuckDB file backing the cache (in-memory when omitted).
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve the current risk through the fallback chain.
    ///
    /// # Examples
    ///
    ///   firerisk current 55.9533 -3.1883
    ///   firerisk current 40.7128 -74.0060 --deadline-ms 2500
    Current(CurrentArgs),

    /// Show how a coordinate is classified without contacting any source.
    Locate(CoordinateArgs),

    /// Print the configuration resolved from defaults and environment.
    Config,
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Args)]
pub struct CoordinateArgs {
    /// Latitude in [-90, 90].
    #[arg(allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in [-180, 180].
    #[arg(allow_negative_numbers = true)]
    pub lon: f64,
}

#[derive(Debug, Args)]
pub struct CurrentArgs {
    #[command(flatten)]
    pub coordinate: CoordinateArgs,

    /// Overall deadline for this request in milliseconds.
    #[arg(long)]
    pub deadline_ms: Option<u64>,
}
