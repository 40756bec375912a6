use engine_core::error::RemoteError;
use model::core::identifiers::TransformationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error("Page at offset {offset} failed after {attempts} attempt(s): {source}")]
    PageFailed {
        offset: usize,
        attempts: usize,
        #[source]
        source: RemoteError,
    },
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to read current file statuses of transformation {transformation_id}: {source}")]
    ReadCurrent {
        transformation_id: TransformationId,
        #[source]
        source: FetchError,
    },
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("'{0}' is not a valid transformation status")]
    InvalidStatus(String),

    #[error("Failed to read status of transformation {transformation_id}: {source}")]
    Lookup {
        transformation_id: TransformationId,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to write parameter '{name}' of transformation {transformation_id}: {source}")]
    Write {
        transformation_id: TransformationId,
        name: String,
        #[source]
        source: RemoteError,
    },
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to resolve transformation {transformation_id}: {source}")]
    Resolve {
        transformation_id: TransformationId,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to list files of transformation {transformation_id}: {source}")]
    Listing {
        transformation_id: TransformationId,
        #[source]
        source: FetchError,
    },
}

/// Errors surfaced by [`crate::client::TransformationClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}
