//! Reparto local cache
//!
//! SQLite through sqlx. The cache mirrors server data for offline reads and
//! queues courier location pings until the server has accepted them.
//! [`CacheStore`] is the write path and the source of reactive snapshots.

pub mod connection;
pub mod migrations;
pub mod notify;
pub mod queries;
pub mod store;

pub use connection::{connect, DatabaseConfig, DbPool};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity, SCHEMA_VERSION};
pub use notify::{ChangeNotifier, Table};
pub use store::{CacheCounts, CacheStore, Snapshots};
