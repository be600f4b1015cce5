// crates/resilience/src/error.rs
//! Error types for resilience operations

use reparto_core::AppError;
use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts exhausted: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// Policy parameters make no sense
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,
}

impl From<ResilienceError> for AppError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::RetriesExhausted {
                attempts,
                last_error,
            } => AppError::SyncFailed {
                reason: format!("gave up after {} attempts: {}", attempts, last_error),
            },
            ResilienceError::InvalidPolicy(reason) => AppError::InvalidConfiguration {
                setting: "sync".to_string(),
                value: String::new(),
                reason,
            },
            ResilienceError::Cancelled => AppError::Cancelled {
                operation: "retry".to_string(),
            },
        }
    }
}
