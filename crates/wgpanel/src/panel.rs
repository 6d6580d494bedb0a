//! Process-scoped context owning every store
//!
//! A [`Panel`] wires one [`ApiClient`] and one [`NotificationQueue`] into the
//! peer, settings and stats stores. Create one per process (or per test) and
//! pass it around; there are no global singletons.
//!
//! # Example
//!
//! ```rust,no_run
//! use wgpanel::{Config, Panel};
//!
//! # async fn example() -> wgpanel::Result<()> {
//! let panel = Panel::new(Config::from_env())?;
//! panel.start_background_refresh()?;
//!
//! let mut peers = panel.peers().subscribe();
//! while peers.changed().await.is_ok() {
//!     println!("{} peers online", panel.peers().online_count());
//! }
//!
//! panel.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notification::NotificationQueue;
use crate::store::{PeerStore, SettingsStore, StatsStore};

/// How long shutdown waits for each poll loop before aborting it
const POLL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelState {
    Running,
    Shutdown,
}

/// The panel context.
///
/// Cheap to clone; clones share the same stores and lifecycle.
#[derive(Debug, Clone)]
pub struct Panel {
    config: Arc<Config>,
    state: Arc<RwLock<PanelState>>,
    notifications: NotificationQueue,
    peers: PeerStore,
    settings: SettingsStore,
    stats: StatsStore,
}

impl Panel {
    /// Build the client, the notification queue and all stores.
    ///
    /// Fails with [`Error::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        let notifications = NotificationQueue::new();

        let peers = PeerStore::new(client.clone(), notifications.clone(), &config);
        let settings = SettingsStore::new(client.clone(), notifications.clone());
        let stats = StatsStore::new(client, notifications.clone(), &config);

        info!(api = %config.api_base_url, "Panel initialized");

        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(PanelState::Running)),
            notifications,
            peers,
            settings,
            stats,
        })
    }

    /// The peer registry
    #[must_use]
    pub fn peers(&self) -> &PeerStore {
        &self.peers
    }

    /// Global settings
    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Interface statistics
    #[must_use]
    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    /// The shared notification queue
    #[must_use]
    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    /// The configuration the panel was built with
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether [`Panel::shutdown`] has not been called yet
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.state.read() == PanelState::Running
    }

    /// Start polling peers and stats.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_background_refresh(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::Shutdown);
        }
        self.peers.start_polling();
        self.stats.start_polling();
        Ok(())
    }

    /// Stop all background work and drop pending notifications.
    ///
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == PanelState::Shutdown {
                debug!("Panel already shut down");
                return;
            }
            *state = PanelState::Shutdown;
        }

        info!("Shutting down panel");
        self.peers.shutdown(POLL_SHUTDOWN_TIMEOUT).await;
        self.stats.shutdown(POLL_SHUTDOWN_TIMEOUT).await;
        self.notifications.clear();
        info!("Panel shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let err = Panel::new(Config::new("not a url")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let panel = Panel::new(Config::new("http://127.0.0.1:9")).unwrap();
        assert!(panel.is_running());

        panel.start_background_refresh().unwrap();
        assert!(panel.peers().is_polling());
        assert!(panel.stats().is_polling());

        panel.notifications().info("bye");
        panel.shutdown().await;
        assert!(!panel.is_running());
        assert!(!panel.peers().is_polling());
        assert!(!panel.stats().is_polling());
        assert!(panel.notifications().is_empty());

        // Second shutdown is harmless, restarting is refused
        panel.shutdown().await;
        assert!(matches!(
            panel.start_background_refresh(),
            Err(Error::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_stores_refuse_polling_after_shutdown() {
        let panel = Panel::new(Config::new("http://127.0.0.1:9")).unwrap();
        let peers = panel.peers().clone();
        let stats = panel.stats().clone();
        panel.shutdown().await;

        peers.start_polling();
        stats.start_polling();
        assert!(!peers.is_polling());
        assert!(!stats.is_polling());
    }
}
