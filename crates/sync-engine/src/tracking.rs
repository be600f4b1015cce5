// crates/sync-engine/src/tracking.rs
//! Courier location tracking
//!
//! A tracker task samples a [`LocationSource`] on a fixed interval, queues each
//! position as an unsynced ping and tries to send it right away. Pings the
//! server does not take stay queued for the sync worker. Both sides claim a
//! ping before sending it, so each ping is uploaded at most once at a time.

use crate::error::SyncResult;
use async_trait::async_trait;
use reparto_core::{Coordinates, LocationPing, UserId};
use reparto_database::CacheStore;
use reparto_network::LocationApi;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Provider of the device position
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Current position, or `None` when no fix is available
    async fn current_position(&self) -> Option<Coordinates>;
}

/// Walks back and forth along a list of waypoints
#[derive(Debug)]
pub struct SimulatedLocationSource {
    waypoints: Vec<Coordinates>,
    steps_per_leg: u32,
    cursor: Mutex<(usize, u32)>,
}

impl SimulatedLocationSource {
    pub fn new(waypoints: Vec<Coordinates>, steps_per_leg: u32) -> Self {
        Self {
            waypoints,
            steps_per_leg: steps_per_leg.max(1),
            cursor: Mutex::new((0, 0)),
        }
    }

    /// A short loop through central Madrid
    pub fn madrid() -> Self {
        Self::new(
            vec![
                Coordinates::new(40.4168, -3.7038),
                Coordinates::new(40.4203, -3.7058),
                Coordinates::new(40.4240, -3.6995),
                Coordinates::new(40.4180, -3.6935),
            ],
            6,
        )
    }

    fn next_position(&self) -> Option<Coordinates> {
        match self.waypoints.len() {
            0 => None,
            1 => Some(self.waypoints[0]),
            len => {
                let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
                let (leg, step) = *cursor;
                let from = self.waypoints[leg];
                let to = self.waypoints[(leg + 1) % len];
                let t = f64::from(step) / f64::from(self.steps_per_leg);
                let position = Coordinates::new(
                    from.latitude + (to.latitude - from.latitude) * t,
                    from.longitude + (to.longitude - from.longitude) * t,
                );

                *cursor = if step + 1 >= self.steps_per_leg {
                    ((leg + 1) % len, 0)
                } else {
                    (leg, step + 1)
                };
                Some(position)
            }
        }
    }
}

#[async_trait]
impl LocationSource for SimulatedLocationSource {
    async fn current_position(&self) -> Option<Coordinates> {
        self.next_position()
    }
}

/// Counters returned when tracking stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingStats {
    pub recorded: u64,
    pub sent: u64,
    pub without_fix: u64,
    pub errors: u64,
}

pub struct LocationTracker {
    store: CacheStore,
    api: Arc<dyn LocationApi>,
    source: Arc<dyn LocationSource>,
    courier_id: UserId,
    interval: Duration,
}

impl LocationTracker {
    pub fn new(
        store: CacheStore,
        api: Arc<dyn LocationApi>,
        source: Arc<dyn LocationSource>,
        courier_id: UserId,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            api,
            source,
            courier_id,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Records one position and makes a single attempt to send it
    ///
    /// Returns the stored ping, or `None` when the source had no valid fix.
    pub async fn record_once(&self) -> SyncResult<Option<LocationPing>> {
        let Some(position) = self.source.current_position().await else {
            log::debug!("No position fix for courier {}", self.courier_id);
            return Ok(None);
        };
        if !position.is_valid() {
            log::warn!(
                "Ignoring out-of-range position {}, {}",
                position.latitude,
                position.longitude
            );
            return Ok(None);
        }

        let mut ping = LocationPing::new(self.courier_id, position);
        let id = self.store.insert_ping(&ping).await?;
        ping.id = Some(id);

        if !self.store.claim_ping(id).await? {
            log::debug!("Ping {} already taken by the sync worker", id);
            return Ok(Some(ping));
        }

        match self.api.create_location(&ping).await {
            Ok(()) => {
                self.store.mark_ping_synced(id).await?;
                ping.synced = true;
            }
            Err(e) => {
                log::debug!("Ping {} queued for later: {}", id, e);
                self.store.release_ping(id).await?;
            }
        }

        Ok(Some(ping))
    }

    /// Spawns the tracking loop; the first sample is taken immediately
    pub fn start(self) -> TrackingHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let courier_id = self.courier_id;

        let task = tokio::spawn(async move {
            let mut stats = TrackingStats::default();
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            log::info!(
                "Tracking courier {} every {:?}",
                self.courier_id,
                self.interval
            );

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                match self.record_once().await {
                    Ok(Some(ping)) => {
                        stats.recorded += 1;
                        if ping.synced {
                            stats.sent += 1;
                        }
                    }
                    Ok(None) => stats.without_fix += 1,
                    Err(e) => {
                        stats.errors += 1;
                        log::warn!("Could not record position: {}", e);
                    }
                }
            }

            log::info!(
                "Tracking stopped: {} recorded, {} sent",
                stats.recorded,
                stats.sent
            );
            stats
        });

        TrackingHandle {
            courier_id,
            stop: stop_tx,
            task,
        }
    }
}

/// Owner of a running tracker
///
/// Dropping the handle also ends the loop.
pub struct TrackingHandle {
    courier_id: UserId,
    stop: watch::Sender<bool>,
    task: JoinHandle<TrackingStats>,
}

impl TrackingHandle {
    pub fn courier_id(&self) -> UserId {
        self.courier_id
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop after the current sample and returns its counters
    pub async fn stop(self) -> TrackingStats {
        let _ = self.stop.send(true);
        self.task.await.unwrap_or_default()
    }
}
