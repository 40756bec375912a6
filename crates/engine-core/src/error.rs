use crate::retry::RetryDisposition;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or while talking to) the remote transformation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transport failure during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by the service: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl RemoteError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        RemoteError::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Transport-level failures are worth another attempt; anything the
    /// service answered deliberately is not.
    pub fn disposition(&self) -> RetryDisposition {
        match self {
            RemoteError::Transport { .. }
            | RemoteError::Timeout { .. }
            | RemoteError::Unavailable(_) => RetryDisposition::Retry,
            RemoteError::Rejected(_)
            | RemoteError::NotFound(_)
            | RemoteError::InvalidArgument(_) => RetryDisposition::Stop,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.disposition() == RetryDisposition::Retry
    }
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
