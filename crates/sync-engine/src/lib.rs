// crates/sync-engine/src/lib.rs
//! Background synchronization for the Reparto client
//!
//! - [`SyncWorker`] refreshes the product catalog, flushes queued location
//!   pings and prunes old ones
//! - [`SyncScheduler`] runs workers periodically under a unique key, waiting
//!   for connectivity and backing off between failed attempts
//! - [`LocationTracker`] samples courier positions into the ping queue
//!
//! The worker and the tracker share nothing but the [`CacheStore`]
//! (`reparto_database::CacheStore`).
//!
//! # Example
//!
//! ```rust
//! use reparto_sync_engine::{Constraints, SyncReport, WorkOutcome};
//!
//! let outcome = WorkOutcome::Success(SyncReport::started().finish());
//! assert!(outcome.is_success());
//! assert!(Constraints::network().requires_network);
//! ```

mod error;
mod scheduler;
mod tracking;
mod types;
mod worker;

pub use error::{SyncError, SyncResult};
pub use scheduler::{SyncScheduler, MIN_PERIODIC_INTERVAL};
pub use tracking::{
    LocationSource, LocationTracker, SimulatedLocationSource, TrackingHandle, TrackingStats,
};
pub use types::{
    Constraints, EnqueueResult, SyncReport, WorkId, WorkInfo, WorkOutcome, WorkState,
};
pub use worker::{available_products, DrainStats, SyncSettings, SyncWorker, Worker};

/// Key under which the periodic catalog/ping sync is scheduled
pub const SYNC_WORK_KEY: &str = "reparto-sync";
