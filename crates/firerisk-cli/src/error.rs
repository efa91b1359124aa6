use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] firerisk_core::ValidationError),

    #[error(transparent)]
    Config(#[from] firerisk_core::ConfigError),

    #[error(transparent)]
    Cache(#[from] firerisk_core::CacheError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 3,
            Self::Serialization(_) => 4,
            Self::Cache(_) | Self::Io(_) => 10,
        }
    }
}
