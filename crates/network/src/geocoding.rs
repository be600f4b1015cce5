// crates/network/src/geocoding.rs
//! Address geocoding against a Nominatim-compatible service
//!
//! Hits are kept in a `moka` cache keyed by the normalized address. Addresses
//! the service does not know are not cached, so a later call may still find them.

use crate::error::{NetworkError, NetworkResult};
use async_trait::async_trait;
use moka::future::Cache;
use reparto_core::Coordinates;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait GeocodingApi: Send + Sync {
    /// Resolves a free-form address; `Ok(None)` when nothing matches
    async fn geocode(&self, address: &str) -> NetworkResult<Option<Coordinates>>;
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.lat.trim().parse::<f64>().ok()?;
        let longitude = self.lon.trim().parse::<f64>().ok()?;
        let coordinates = Coordinates::new(latitude, longitude);
        coordinates.is_valid().then_some(coordinates)
    }
}

/// Trimmed, lowercased, whitespace collapsed
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    search_url: Url,
    timeout_secs: u64,
    cache: Cache<String, Coordinates>,
}

impl Geocoder {
    pub fn new(base_url: &str, capacity: u64, timeout: Duration) -> NetworkResult<Self> {
        let base = crate::client::parse_base_url(base_url)?;
        let search_url = base
            .join("search")
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("Reparto/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(DEFAULT_TTL)
            .build();

        Ok(Self {
            http,
            search_url,
            timeout_secs: timeout.as_secs(),
            cache,
        })
    }

    /// Number of cached addresses
    pub async fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    async fn lookup(&self, query: &str) -> NetworkResult<Option<Coordinates>> {
        let operation = "GET search";
        let response = self
            .http
            .get(self.search_url.clone())
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&e, operation, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))?;

        Ok(places.first().and_then(Place::coordinates))
    }
}

#[async_trait]
impl GeocodingApi for Geocoder {
    async fn geocode(&self, address: &str) -> NetworkResult<Option<Coordinates>> {
        let key = normalize_address(address);
        if key.is_empty() {
            return Ok(None);
        }

        if let Some(hit) = self.cache.get(&key).await {
            log::debug!("Geocoding cache hit for '{}'", key);
            return Ok(Some(hit));
        }

        let found = self.lookup(&key).await?;
        match found {
            Some(coordinates) => {
                self.cache.insert(key, coordinates).await;
            }
            None => log::info!("No geocoding match for '{}'", address.trim()),
        }
        Ok(found)
    }
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("search_url", &self.search_url.as_str())
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("  Calle  Mayor 1,\tMADRID "),
            "calle mayor 1, madrid"
        );
        assert_eq!(normalize_address("   "), "");
    }

    #[test]
    fn test_place_coordinates() {
        let place = Place {
            lat: "40.4168".to_string(),
            lon: "-3.7038".to_string(),
        };
        assert_eq!(place.coordinates(), Some(Coordinates::new(40.4168, -3.7038)));

        let bogus = Place {
            lat: "abc".to_string(),
            lon: "1".to_string(),
        };
        assert!(bogus.coordinates().is_none());
    }

    #[test]
    fn test_search_url() {
        let geocoder = Geocoder::new(
            "https://nominatim.openstreetmap.org",
            10,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            geocoder.search_url.as_str(),
            "https://nominatim.openstreetmap.org/search"
        );
    }

    #[tokio::test]
    async fn test_blank_address_skips_lookup() {
        let geocoder = Geocoder::new("http://127.0.0.1:9", 10, Duration::from_secs(1)).unwrap();
        assert_eq!(geocoder.geocode("  ").await.unwrap(), None);
    }
}
