//! Validation system for configuration values
//!
//! Each config section implements [`ConfigSection`], which includes validation.

pub use crate::error::ValidationError;

/// A configuration section that can validate and merge itself
pub trait ConfigSection: Default {
    /// Validates the configuration section
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one
    ///
    /// Values from `other` take precedence.
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a numeric value is not below `min`
    pub fn at_least<T>(value: T, min: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min {
            Err(ValidationError::with_value(
                field,
                format!("must be at least {}", min),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is an absolute `http`/`https` URL with a host
    pub fn http_url(value: &str, field: &str) -> Result<(), ValidationError> {
        Self::not_empty(value, field)?;

        let rest = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"));

        match rest {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
            _ => Err(ValidationError::with_value(
                field,
                "must be an http:// or https:// URL",
                value,
            )),
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_valid() {
        assert!(Validator::in_range(50, 0, 100, "test").is_ok());
        assert!(Validator::in_range(0, 0, 100, "test").is_ok());
        assert!(Validator::in_range(100, 0, 100, "test").is_ok());
    }

    #[test]
    fn test_in_range_invalid() {
        assert!(Validator::in_range(-1, 0, 100, "test").is_err());
        assert!(Validator::in_range(101, 0, 100, "test").is_err());
    }

    #[test]
    fn test_at_least() {
        assert!(Validator::at_least(15, 15, "test").is_ok());
        let err = Validator::at_least(14, 15, "sync.interval_minutes").unwrap_err();
        assert_eq!(err.field, "sync.interval_minutes");
        assert_eq!(err.value.as_deref(), Some("14"));
    }

    #[test]
    fn test_not_empty_valid() {
        assert!(Validator::not_empty("hello", "test").is_ok());
        assert!(Validator::not_empty("  hello  ", "test").is_ok());
    }

    #[test]
    fn test_not_empty_invalid() {
        assert!(Validator::not_empty("", "test").is_err());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_http_url() {
        assert!(Validator::http_url("http://localhost:5000/api/", "test").is_ok());
        assert!(Validator::http_url("https://nominatim.openstreetmap.org", "test").is_ok());
        assert!(Validator::http_url("localhost:5000", "test").is_err());
        assert!(Validator::http_url("ftp://example.com", "test").is_err());
        assert!(Validator::http_url("http://", "test").is_err());
        assert!(Validator::http_url("", "test").is_err());
    }

    #[test]
    fn test_collect_errors_all_ok() {
        let results = vec![Ok(()), Ok(()), Ok(())];
        assert!(Validator::collect_errors(results).is_ok());
    }

    #[test]
    fn test_collect_errors_some_err() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Ok(()),
            Err(ValidationError::new("field2", "error2")),
        ];
        let result = Validator::collect_errors(results);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 2);
    }
}
