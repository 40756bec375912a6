use engine_config::SettingsError;
use engine_core::error::SnapshotError;
use engine_processing::error::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to access the service snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
