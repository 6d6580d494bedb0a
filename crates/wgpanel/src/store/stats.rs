//! Interface statistics store
//!
//! Holds the latest interface counters and the traffic history. Like the peer
//! store it can refresh itself in the background; background refreshes fail
//! silently.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::PollSlot;
use crate::api::{self, ApiClient};
use crate::config::Config;
use crate::notification::NotificationQueue;
use crate::observable::Observable;

/// Aggregate counters of the WireGuard interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    /// Interface name, e.g. `wg0`
    pub interface_name: String,
    /// Server public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// UDP listen port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    /// Tunnel subnet in CIDR form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Number of configured peers
    #[serde(default)]
    pub peer_count: u32,
    /// Total bytes received
    #[serde(default)]
    pub total_rx: u64,
    /// Total bytes sent
    #[serde(default)]
    pub total_tx: u64,
}

/// One sample of the traffic history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsHistoryPoint {
    /// Sample time in Unix seconds
    pub timestamp: i64,
    /// Total bytes received at that time
    #[serde(default)]
    pub total_rx: u64,
    /// Total bytes sent at that time
    #[serde(default)]
    pub total_tx: u64,
}

impl StatsHistoryPoint {
    /// Sample time, `None` if out of range
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Store of interface statistics
#[derive(Clone)]
pub struct StatsStore {
    inner: Arc<StatsInner>,
}

struct StatsInner {
    client: ApiClient,
    notifications: NotificationQueue,
    stats: Observable<Option<InterfaceStats>>,
    history: Observable<Vec<StatsHistoryPoint>>,
    poller: PollSlot,
    poll_interval: Duration,
}

impl StatsStore {
    /// Create an empty store
    #[must_use]
    pub fn new(client: ApiClient, notifications: NotificationQueue, config: &Config) -> Self {
        Self {
            inner: Arc::new(StatsInner {
                client,
                notifications,
                stats: Observable::default(),
                history: Observable::default(),
                poller: PollSlot::default(),
                poll_interval: config.stats_poll_interval(),
            }),
        }
    }

    /// Latest counters, if loaded
    #[must_use]
    pub fn stats(&self) -> Option<InterfaceStats> {
        self.inner.stats.get()
    }

    /// Loaded traffic history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<StatsHistoryPoint> {
        self.inner.history.get()
    }

    /// Subscribe to counter changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<InterfaceStats>> {
        self.inner.stats.subscribe()
    }

    /// Fetch the counters, notifying on failure
    pub async fn load(&self) -> bool {
        self.load_with(false).await
    }

    /// Fetch the counters without notifying on failure
    pub async fn load_silent(&self) -> bool {
        self.load_with(true).await
    }

    async fn load_with(&self, silent: bool) -> bool {
        match api::stats::get(&self.inner.client).await.into_result() {
            Err(e) => {
                if silent {
                    debug!(error = %e, "Background stats refresh failed");
                } else {
                    warn!(error = %e, "Failed to load stats");
                    self.inner
                        .notifications
                        .error(format!("Failed to load stats: {}", e.error));
                }
                false
            }
            Ok(Some(stats)) => {
                self.inner.stats.set(Some(stats));
                true
            }
            Ok(None) => true,
        }
    }

    /// Fetch the traffic history
    pub async fn load_history(&self) -> bool {
        match api::stats::history(&self.inner.client).await.into_result() {
            Err(e) => {
                warn!(error = %e, "Failed to load stats history");
                self.inner
                    .notifications
                    .error(format!("Failed to load stats history: {}", e.error));
                false
            }
            Ok(points) => {
                let points = points.unwrap_or_default();
                debug!(points = points.len(), "Stats history loaded");
                self.inner.history.set(points);
                true
            }
        }
    }

    /// Start the background refresh. Starting twice, or after shutdown, has no effect.
    pub fn start_polling(&self) {
        self.inner.poller.start(
            "stats",
            self.inner.poll_interval,
            Arc::downgrade(&self.inner),
            |inner| async move {
                StatsStore { inner }.load_silent().await;
            },
        );
    }

    /// Stop the background refresh
    pub fn stop_polling(&self) {
        self.inner.poller.stop();
    }

    /// Whether the background refresh is running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    pub(crate) async fn shutdown(&self, timeout: Duration) {
        self.inner.poller.close(timeout).await;
    }
}

impl std::fmt::Debug for StatsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsStore")
            .field("stats", &self.stats())
            .field("polling", &self.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_backend() {
        let stats: InterfaceStats = serde_json::from_str(
            r#"{"interfaceName":"wg0","publicKey":"srv=","listenPort":51820,"subnet":"10.0.0.0/24","peerCount":3,"totalRx":100,"totalTx":200}"#,
        )
        .unwrap();
        assert_eq!(stats.listen_port, Some(51820));
        assert_eq!(stats.peer_count, 3);

        let bare: InterfaceStats = serde_json::from_str(r#"{"interfaceName":"wg0"}"#).unwrap();
        assert!(bare.subnet.is_none());
        assert_eq!(bare.total_rx, 0);
    }

    #[test]
    fn test_history_point_time() {
        let point: StatsHistoryPoint =
            serde_json::from_str(r#"{"timestamp":1767225600,"totalRx":5,"totalTx":6}"#).unwrap();
        assert_eq!(
            point.time().unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_silent_load_is_quiet() {
        let config = Config::new("http://127.0.0.1:9").with_request_timeout(2);
        let notifications = NotificationQueue::new();
        let store = StatsStore::new(
            ApiClient::new(&config).unwrap(),
            notifications.clone(),
            &config,
        );

        assert!(!store.load_silent().await);
        assert!(notifications.is_empty());

        assert!(!store.load().await);
        assert_eq!(notifications.len(), 1);
        assert!(store.stats().is_none());
    }
}
