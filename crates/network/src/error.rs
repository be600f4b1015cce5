// crates/network/src/error.rs
//! Error types for network operations

use reparto_core::AppError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Classified failure of a remote call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// Could not reach the server at all
    #[error("No connectivity: {0}")]
    NoConnectivity(String),

    /// Connect, read or overall deadline elapsed
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response without the body the operation needs
    #[error("Empty response body: {0}")]
    EmptyBody(String),

    /// Body was not the JSON we expected
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl NetworkError {
    /// Classifies a reqwest failure
    pub fn from_reqwest(e: &reqwest::Error, operation: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout {
                operation: operation.to_string(),
                seconds: timeout_secs,
            }
        } else if e.is_connect() {
            NetworkError::NoConnectivity(format!("{}: {}", operation, e))
        } else if e.is_decode() {
            NetworkError::Decode(format!("{}: {}", operation, e))
        } else if let Some(status) = e.status() {
            NetworkError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }
        } else {
            NetworkError::Transport(format!("{}: {}", operation, e))
        }
    }

    /// HTTP status code, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::NoConnectivity(_)
            | NetworkError::Timeout { .. }
            | NetworkError::Transport(_) => true,
            NetworkError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::NoConnectivity(message) => AppError::NoConnectivity { message },
            NetworkError::Timeout { operation, seconds } => {
                AppError::NetworkTimeout { operation, seconds }
            }
            NetworkError::Http { status, message } => AppError::HttpStatus {
                code: status,
                message,
            },
            NetworkError::EmptyBody(operation) => AppError::EmptyBody { operation },
            err @ (NetworkError::Decode(_) | NetworkError::Transport(_)) => AppError::NetworkError {
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
            NetworkError::InvalidUrl(value) => AppError::InvalidConfiguration {
                setting: "api.base_url".to_string(),
                value,
                reason: "not a valid URL".to_string(),
            },
        }
    }
}
