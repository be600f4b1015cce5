// crates/sync-engine/src/worker.rs
//! The periodic sync job: refresh the catalog, flush queued pings, prune old ones

use crate::error::SyncResult;
use crate::types::{SyncReport, WorkOutcome};
use async_trait::async_trait;
use reparto_core::{Product, Timestamp};
use reparto_database::CacheStore;
use reparto_network::{LocationApi, ProductApi};
use std::sync::Arc;

/// A unit of schedulable work
#[async_trait]
pub trait Worker: Send + Sync {
    /// Runs once; `attempt` counts previous failed runs of this cycle
    async fn do_work(&self, attempt: usize) -> WorkOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Failed runs that are still answered with `Retry`
    pub max_retries: usize,
    /// Synced pings older than this are deleted
    pub ping_retention_hours: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            ping_retention_hours: 72,
        }
    }
}

/// Pings that could not be delivered stay queued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub sent: usize,
    pub failed: usize,
    /// Claimed by another uploader when the drain reached them
    pub skipped: usize,
}

/// Products a customer can actually order
pub fn available_products(products: Vec<Product>) -> Vec<Product> {
    products.into_iter().filter(Product::is_available).collect()
}

pub struct SyncWorker {
    store: CacheStore,
    products: Arc<dyn ProductApi>,
    locations: Arc<dyn LocationApi>,
    settings: SyncSettings,
}

impl SyncWorker {
    pub fn new(
        store: CacheStore,
        products: Arc<dyn ProductApi>,
        locations: Arc<dyn LocationApi>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            products,
            locations,
            settings,
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// One full pass; per-ping failures are counted, not raised
    pub async fn run_once(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::started();

        let remote = self.products.list_products().await?;
        let total = remote.len();
        let available = available_products(remote);
        self.store.replace_products(&available).await?;
        report.products_cached = available.len();
        report.products_skipped = total - available.len();

        let drained = self.drain_pings().await?;
        report.pings_sent = drained.sent;
        report.pings_failed = drained.failed;

        let cutoff = Timestamp::now().minus_hours(self.settings.ping_retention_hours);
        report.pings_pruned = self.store.prune_synced_before(cutoff).await?;

        Ok(report.finish())
    }

    /// Submits every unsynced ping not already being sent, oldest first
    pub async fn drain_pings(&self) -> SyncResult<DrainStats> {
        let pending = self.store.pending_pings().await?;
        let mut stats = DrainStats::default();

        for ping in pending {
            let Some(id) = ping.id else {
                continue;
            };
            if !self.store.claim_ping(id).await? {
                log::debug!("Ping {} is being sent by the tracker", id);
                stats.skipped += 1;
                continue;
            }

            if let Err(e) = self.locations.create_location(&ping).await {
                log::warn!("Ping {} not accepted: {}", id, e);
                stats.failed += 1;
                if let Err(e) = self.store.release_ping(id).await {
                    log::warn!("Ping {} could not be requeued: {}", id, e);
                }
                continue;
            }

            match self.store.mark_ping_synced(id).await {
                Ok(_) => stats.sent += 1,
                Err(e) => {
                    log::warn!("Ping {} sent but not marked synced: {}", id, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    fn outcome(&self, result: SyncResult<SyncReport>, attempt: usize) -> WorkOutcome {
        match result {
            Ok(report) => {
                log::info!("Sync finished: {}", report.summary());
                WorkOutcome::Success(report)
            }
            Err(e) if attempt < self.settings.max_retries => {
                log::warn!("Sync attempt {} failed, will retry: {}", attempt + 1, e);
                WorkOutcome::Retry(e.to_string())
            }
            Err(e) => {
                log::error!("Sync failed after {} attempts: {}", attempt + 1, e);
                WorkOutcome::Failure(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Worker for SyncWorker {
    async fn do_work(&self, attempt: usize) -> WorkOutcome {
        let result = self.run_once().await;
        self.outcome(result, attempt)
    }
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("settings", &self.settings)
            .finish()
    }
}
