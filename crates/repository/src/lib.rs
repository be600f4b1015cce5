//! Reparto repositories
//!
//! The layer callers talk to. Every operation hides where data comes from
//! (server, cache or both) and hands back a [`Resource`]: errors never escape
//! as `Err`, they arrive as `Resource::Error` with a message fit for a person.
//!
//! Products and routes are cache-first and observable. Orders and users go
//! to the server every time.

mod auth;
mod orders;
mod products;
mod routes;
mod users;

pub use auth::AuthRepository;
pub use orders::OrderRepository;
pub use products::{categories, filter_by_category, search, ProductRepository};
pub use routes::{RouteAssignment, RouteRepository};
pub use users::UserRepository;

pub use reparto_core::Resource;

use reparto_config::PreferencesStore;
use reparto_core::SessionStore;
use reparto_database::CacheStore;
use reparto_network::{ApiClient, GeocodingApi};
use std::sync::Arc;

/// All repositories wired to one API client and one cache
pub struct Repositories {
    pub auth: AuthRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub routes: RouteRepository,
    pub users: UserRepository,
}

impl Repositories {
    pub fn new(
        client: ApiClient,
        store: CacheStore,
        session: SessionStore,
        preferences: PreferencesStore,
        geocoder: Option<Arc<dyn GeocodingApi>>,
    ) -> Self {
        let api = Arc::new(client);

        let mut orders = OrderRepository::new(api.clone());
        if let Some(geocoder) = geocoder {
            orders = orders.with_geocoder(geocoder);
        }

        Self {
            auth: AuthRepository::new(api.clone(), session, preferences),
            products: ProductRepository::new(api.clone(), store.clone()),
            orders,
            routes: RouteRepository::new(api.clone(), api.clone(), store.clone()),
            users: UserRepository::new(api, store),
        }
    }
}
