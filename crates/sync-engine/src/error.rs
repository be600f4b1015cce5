// crates/sync-engine/src/error.rs
//! Error types for sync operations

use reparto_core::AppError;
use reparto_network::NetworkError;
use reparto_resilience::ResilienceError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote call failed
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Local cache failed
    #[error("Storage error: {0}")]
    Storage(#[from] AppError),

    /// Retry budget spent or policy rejected
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// Scheduler no longer accepts work
    #[error("Scheduler has been shut down")]
    ShutDown,

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Network(e) => e.into(),
            SyncError::Storage(e) => e,
            SyncError::Resilience(e) => e.into(),
            SyncError::ShutDown => AppError::Cancelled {
                operation: "sync".to_string(),
            },
            SyncError::Custom(reason) => AppError::SyncFailed { reason },
        }
    }
}
