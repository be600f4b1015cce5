//! Courier GPS ping model

use crate::types::{Coordinates, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A single courier position, recorded locally before it reaches the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPing {
    /// Local row id; `None` until the ping has been stored
    pub id: Option<i64>,
    pub courier_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: Timestamp,
    pub synced: bool,
}

impl LocationPing {
    /// Creates an unsynced ping stamped with the current time
    pub fn new(courier_id: UserId, position: Coordinates) -> Self {
        Self {
            id: None,
            courier_id,
            latitude: position.latitude,
            longitude: position.longitude,
            recorded_at: Timestamp::now(),
            synced: false,
        }
    }

    pub fn at(mut self, recorded_at: Timestamp) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}
