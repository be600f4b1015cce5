//! Tagged result handed to callers by every repository operation

use crate::error::AppError;

/// Outcome of a repository call
///
/// Exactly one of three states. Only `Success` and `Error` carry data, so a
/// caller matching on a `Resource` has to handle all three.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    /// The operation completed with a value
    Success(T),
    /// The operation failed; the message is safe to show to a person
    Error(String),
    /// The operation is still running
    Loading,
}

impl<T> Resource<T> {
    /// Wraps an error, using its user-facing message
    pub fn from_error(err: &AppError) -> Self {
        Resource::Error(err.user_message())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Resource::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Resource::Error(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    /// Borrow the value, if any
    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Take the value, if any
    pub fn into_data(self) -> Option<T> {
        match self {
            Resource::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Resource::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Transforms the success value, leaving the other states untouched
    pub fn map<U, F>(self, f: F) -> Resource<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Resource::Success(value) => Resource::Success(f(value)),
            Resource::Error(message) => Resource::Error(message),
            Resource::Loading => Resource::Loading,
        }
    }
}

impl<T> From<Result<T, AppError>> for Resource<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => Resource::Success(value),
            Err(err) => {
                if err.is_critical() {
                    log::error!("{}", err);
                } else {
                    log::debug!("{}", err);
                }
                Resource::from_error(&err)
            }
        }
    }
}
