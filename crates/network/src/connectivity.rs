// crates/network/src/connectivity.rs
//! Network connectivity checks

use crate::client::HttpClient;
use crate::error::{NetworkError, NetworkResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Answers "can the backend be reached right now?"
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes the backend's base URL with a HEAD request
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    client: HttpClient,
}

impl ConnectivityChecker {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Checks network connectivity and returns error if offline
    pub async fn check(&self) -> NetworkResult<()> {
        match self.client.ping().await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("Backend unreachable: {}", e);
                Err(NetworkError::NoConnectivity(
                    self.client.base_url().to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl ConnectivityProbe for ConnectivityChecker {
    async fn is_online(&self) -> bool {
        self.check().await.is_ok()
    }
}

/// Probe with a switchable answer, for hosts that learn connectivity from
/// elsewhere and for tests
#[derive(Debug, Clone)]
pub struct StaticProbe {
    online: Arc<AtomicBool>,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
