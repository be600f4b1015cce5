//! Error types and recovery strategies for Reparto
//!
//! Every layer converts its own failures into [`AppError`] before they reach a
//! caller. Errors are classified three ways:
//! - **Kind**: the taxonomy callers branch on (no connectivity, timeout, HTTP
//!   status, empty body, cache miss, validation, unknown)
//! - **Severity**: whether the error is transient, degrades a feature, or is fatal
//! - **Recovery action**: what the sync scheduler or caller should do next

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately (e.g., read timed out)
    RetryImmediate,
    /// Retry with exponential backoff (e.g., device offline, server error)
    RetryWithBackoff,
    /// Sign in again to obtain a fresh session
    Reauthenticate,
    /// Drop the local cache and rebuild it from the server
    RebuildCache,
    /// Correct the input and try again
    FixInput,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::Reauthenticate => write!(f, "Signing in again"),
            Self::RebuildCache => write!(f, "Rebuilding local cache"),
            Self::FixInput => write!(f, "Correct the input"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Feature degraded but app can continue
    Degraded,
    /// Critical error requiring restart or user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Coarse error taxonomy shared by every layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoConnectivity,
    Timeout,
    Http(u16),
    EmptyBody,
    CacheMiss,
    Validation,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnectivity => write!(f, "no-connectivity"),
            Self::Timeout => write!(f, "timeout"),
            Self::Http(code) => write!(f, "http-{}", code),
            Self::EmptyBody => write!(f, "empty-body"),
            Self::CacheMiss => write!(f, "cache-miss"),
            Self::Validation => write!(f, "validation"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Main error type for Reparto
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Network Errors =====
    /// Device has no route to the server
    #[error("No connectivity: {message}")]
    NoConnectivity { message: String },

    /// Network timeout
    #[error("Network timeout after {seconds}s: {operation}")]
    NetworkTimeout { operation: String, seconds: u64 },

    /// Server answered with a non-success status
    #[error("HTTP {code}: {message}")]
    HttpStatus { code: u16, message: String },

    /// Server answered 2xx without the body the operation needs
    #[error("Empty response body: {operation}")]
    EmptyBody { operation: String },

    /// Any other transport failure (TLS, malformed JSON, redirect loop...)
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Cache Errors =====
    /// Local cache operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Record not present in the local cache
    #[error("Cache miss: {entity} with {identifier}")]
    CacheMiss { entity: String, identifier: String },

    /// Schema could not be (re)created
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    // ===== Input Errors =====
    /// Caller supplied an invalid value
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    /// Configuration file corrupted
    #[error("Configuration corrupted: {path}")]
    ConfigurationCorrupted { path: PathBuf },

    // ===== Background Work Errors =====
    /// Background sync run failed
    #[error("Sync failed: {reason}")]
    SyncFailed { reason: String },

    /// Address could not be resolved to coordinates
    #[error("Geocoding failed for '{address}': {reason}")]
    GeocodingFailed { address: String, reason: String },

    // ===== Generic Errors =====
    /// I/O error outside the cache
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Operation cancelled
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Anything not covered above
    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl AppError {
    /// Returns the taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoConnectivity { .. } => ErrorKind::NoConnectivity,
            Self::NetworkTimeout { .. } => ErrorKind::Timeout,
            Self::HttpStatus { code, .. } => ErrorKind::Http(*code),
            Self::EmptyBody { .. } => ErrorKind::EmptyBody,
            Self::CacheMiss { .. } => ErrorKind::CacheMiss,
            Self::Validation { .. } | Self::InvalidConfiguration { .. } => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        }
    }

    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoConnectivity { .. }
            | Self::NetworkTimeout { .. }
            | Self::NetworkError { .. }
            | Self::SyncFailed { .. } => ErrorSeverity::Recoverable,

            Self::HttpStatus { code, .. } if *code >= 500 => ErrorSeverity::Recoverable,

            Self::MigrationFailed { .. } | Self::ConfigurationCorrupted { .. } => {
                ErrorSeverity::Fatal
            }

            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::NetworkTimeout { .. } => RecoveryAction::RetryImmediate,

            Self::NoConnectivity { .. } | Self::NetworkError { .. } | Self::SyncFailed { .. } => {
                RecoveryAction::RetryWithBackoff
            }
            Self::HttpStatus { code, .. } if *code >= 500 => RecoveryAction::RetryWithBackoff,
            Self::HttpStatus { code: 401, .. } => RecoveryAction::Reauthenticate,

            Self::DatabaseError { .. } | Self::MigrationFailed { .. } => {
                RecoveryAction::RebuildCache
            }

            Self::Validation { .. }
            | Self::InvalidConfiguration { .. }
            | Self::GeocodingFailed { .. } => RecoveryAction::FixInput,

            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Self::NoConnectivity { .. } => {
                "No internet connection. Please check your network.".to_string()
            }
            Self::NetworkTimeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            Self::HttpStatus { code, .. } => match code {
                400 => "The server rejected the request. Please review the data.".to_string(),
                401 => "Invalid credentials or expired session. Please sign in again.".to_string(),
                403 => "You do not have permission to perform this action.".to_string(),
                404 => "The requested item was not found on the server.".to_string(),
                409 => "The item was changed by someone else. Please refresh.".to_string(),
                c if *c >= 500 => "The server is having problems. Please try later.".to_string(),
                c => format!("Unexpected server response ({}).", c),
            },
            Self::EmptyBody { .. } => "The server returned no data.".to_string(),
            Self::NetworkError { .. } => {
                "A network error occurred. Please try again.".to_string()
            }

            Self::DatabaseError { .. } => {
                "Local storage is temporarily unavailable. Please try again.".to_string()
            }
            Self::CacheMiss { .. } => "The requested item is not available offline.".to_string(),
            Self::MigrationFailed { .. } => {
                "Local storage had to be rebuilt. Data will be downloaded again.".to_string()
            }

            Self::Validation { field, reason } => format!("{}: {}", field, reason),

            Self::InvalidConfiguration { setting, .. } => {
                format!("Invalid setting: {}. Please check your configuration.", setting)
            }
            Self::ConfigurationCorrupted { .. } => {
                "Settings are corrupted. Resetting to defaults...".to_string()
            }

            Self::SyncFailed { .. } => "Background sync failed. It will retry later.".to_string(),
            Self::GeocodingFailed { .. } => {
                "The delivery address could not be located.".to_string()
            }

            Self::IoError { .. } => "A file operation failed. Please try again.".to_string(),
            Self::Cancelled { .. } => "Operation was cancelled.".to_string(),
            Self::Unknown { .. } => "An unexpected error occurred. Please try again.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Helper to create a network error from any error type
    pub fn network<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Helper to create a cache miss
    pub fn cache_miss(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::CacheMiss {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(
            RecoveryAction::RetryWithBackoff.to_string(),
            "Retrying with backoff"
        );
        assert_eq!(RecoveryAction::Reauthenticate.to_string(), "Signing in again");
        assert_eq!(
            RecoveryAction::UserIntervention.to_string(),
            "User intervention required"
        );
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
        assert!(ErrorSeverity::Degraded < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_kind_taxonomy() {
        let cases = vec![
            (
                AppError::NoConnectivity {
                    message: "dns".to_string(),
                },
                ErrorKind::NoConnectivity,
            ),
            (
                AppError::NetworkTimeout {
                    operation: "GET Productos".to_string(),
                    seconds: 30,
                },
                ErrorKind::Timeout,
            ),
            (
                AppError::HttpStatus {
                    code: 404,
                    message: "Not Found".to_string(),
                },
                ErrorKind::Http(404),
            ),
            (
                AppError::EmptyBody {
                    operation: "login".to_string(),
                },
                ErrorKind::EmptyBody,
            ),
            (AppError::cache_miss("Product", 7), ErrorKind::CacheMiss),
            (AppError::validation("email", "required"), ErrorKind::Validation),
            (
                AppError::Unknown {
                    message: "?".to_string(),
                },
                ErrorKind::Unknown,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_offline_is_retryable() {
        let err = AppError::NoConnectivity {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
        assert_eq!(err.recovery_action(), RecoveryAction::RetryWithBackoff);
        assert!(err.is_retryable());
        assert!(!err.is_critical());
    }

    #[test]
    fn test_server_error_retryable_client_error_not() {
        let server = AppError::HttpStatus {
            code: 503,
            message: "Service Unavailable".to_string(),
        };
        assert!(server.is_retryable());

        let client = AppError::HttpStatus {
            code: 400,
            message: "Bad Request".to_string(),
        };
        assert!(!client.is_retryable());
        assert_eq!(client.severity(), ErrorSeverity::Degraded);
    }

    #[test]
    fn test_unauthorized_requires_reauthentication() {
        let err = AppError::HttpStatus {
            code: 401,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::Reauthenticate);
        assert!(err.user_message().contains("sign in"));
    }

    #[test]
    fn test_user_messages_are_friendly() {
        let err = AppError::NoConnectivity {
            message: "tcp connect error: Connection refused (os error 111)".to_string(),
        };
        let msg = err.user_message();
        assert!(!msg.contains("tcp"));
        assert!(msg.contains("internet"));

        let err = AppError::database(
            "Failed to fetch product",
            io::Error::new(io::ErrorKind::Other, "SQLITE_BUSY"),
        );
        assert!(!err.user_message().contains("SQLITE"));
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = AppError::validation("password", "must not be empty");
        assert_eq!(err.user_message(), "password: must not be empty");
        assert_eq!(err.recovery_action(), RecoveryAction::FixInput);
    }

    #[test]
    fn test_migration_failure_is_fatal() {
        let err = AppError::MigrationFailed {
            version: "3".to_string(),
            reason: "disk I/O error".to_string(),
        };
        assert!(err.is_critical());
        assert_eq!(err.recovery_action(), RecoveryAction::RebuildCache);
    }

    #[test]
    fn test_error_source_chain() {
        let inner = io::Error::new(io::ErrorKind::Other, "Inner error");
        let outer = AppError::network("Outer error", inner);
        assert!(outer.source().is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::IoError { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::HttpStatus {
            code: 422,
            message: "Unprocessable Entity".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("422"));
        assert!(display.contains("Unprocessable"));
    }
}
