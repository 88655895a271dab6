use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ferry_core::Error),
    #[error(transparent)]
    Transport(#[from] ferry_core::transport::TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid JSON value: {0}")]
    InvalidJson(String),
    #[error("`custom` resolution requires --value <JSON>")]
    MissingCustomValue,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Credential storage error: {0}")]
    Credentials(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error(
        "Sync is not configured. Run `ferry config init --endpoint <URL>` or set FERRY_ENDPOINT."
    )]
    SyncNotConfigured,
}
