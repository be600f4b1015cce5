// crates/network/src/lib.rs
//! HTTP access to the Reparto backend
//!
//! [`HttpClient`] handles base URL, timeouts, JSON and bearer auth. The typed
//! traits in [`api`] sit on top of it, one per backend resource, and wire types
//! live in [`dto`].

pub mod api;
mod client;
mod connectivity;
pub mod dto;
mod error;
mod geocoding;

pub use api::{ApiClient, AuthApi, LocationApi, OrderApi, ProductApi, RouteApi, UserApi};
pub use client::{ClientConfig, HttpClient};
pub use connectivity::{ConnectivityChecker, ConnectivityProbe, StaticProbe};
pub use error::{NetworkError, NetworkResult};
pub use geocoding::{normalize_address, Geocoder, GeocodingApi};
