//! Common types and utilities shared across domain models

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp for the current moment
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Creates a timestamp from milliseconds since Unix epoch
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since Unix epoch
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Converts to a chrono UTC datetime, falling back to the epoch when out of range
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_default()
    }

    /// Returns a timestamp `hours` before this one
    pub fn minus_hours(&self, hours: u64) -> Self {
        Self(self.0.saturating_sub((hours as i64).saturating_mul(3_600_000)))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M"))
    }
}

/// WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are inside the valid WGS84 range
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Trait for types that can validate themselves
pub trait Validator {
    /// Validates the instance and returns errors if invalid
    fn validate(&self) -> Result<(), Vec<String>>;

    /// Returns true if the instance is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Folds a wire enum spelling into a comparable key: lowercase ASCII letters and
/// digits only, with Spanish accents stripped.
///
/// `"En Reparto"`, `"EN_REPARTO"` and `"enReparto"` all become `"enreparto"`.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            let c = match c {
                'á' | 'Á' => 'a',
                'é' | 'É' => 'e',
                'í' | 'Í' => 'i',
                'ó' | 'Ó' => 'o',
                'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
                'ñ' | 'Ñ' => 'n',
                other => other,
            };
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_recent() {
        let ts = Timestamp::now();
        assert!(ts.as_millis() > 1_600_000_000_000);
    }

    #[test]
    fn test_timestamp_chrono_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.to_datetime(), dt);
        assert_eq!(ts.to_string(), "2024-03-15 10:30");
    }

    #[test]
    fn test_minus_hours() {
        let ts = Timestamp::from_millis(10 * 3_600_000);
        assert_eq!(ts.minus_hours(3).as_millis(), 7 * 3_600_000);
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(40.4168, -3.7038).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("En Reparto"), "enreparto");
        assert_eq!(normalize_token("EN_REPARTO"), "enreparto");
        assert_eq!(normalize_token("in-delivery"), "indelivery");
        assert_eq!(normalize_token("Administración"), "administracion");
    }
}
