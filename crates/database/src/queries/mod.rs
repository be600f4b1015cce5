//! Database query operations organized by entity

pub mod locations;
pub mod orders;
pub mod products;
pub mod routes;
pub mod users;

use reparto_core::{AppError, Decimal};
use std::str::FromStr;

// Re-export commonly used query functions
pub use locations::{
    claim_ping, count_pending_pings, count_pings, insert_ping, mark_ping_synced, pending_pings,
    prune_synced_before, release_all_claims, release_ping,
};
pub use orders::{count_orders, get_order, list_orders, upsert_order};
pub use products::{count_products, get_product, list_products, replace_products, upsert_product};
pub use routes::{count_routes, get_route, list_routes, replace_routes, upsert_route};
pub use users::{count_users, get_user, list_users, upsert_user};

/// Decimals are stored as TEXT so no precision is lost to REAL
pub(crate) fn parse_decimal(raw: &str, column: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::database(format!("Invalid decimal in {}", column), e))
}

pub(crate) fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
