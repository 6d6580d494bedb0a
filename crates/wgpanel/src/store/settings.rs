//! Global interface settings store

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{self, ApiClient};
use crate::notification::NotificationQueue;
use crate::observable::Observable;

/// Server-wide defaults applied to new client configurations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Tunnel address of the server interface
    #[serde(default)]
    pub server_address: String,
    /// DNS server pushed to clients
    #[serde(default)]
    pub dns: String,
    /// Interface MTU
    #[serde(default)]
    pub mtu: u32,
    /// Keepalive interval in seconds
    #[serde(default)]
    pub keepalive: u32,
    /// Public `host:port` clients connect to
    #[serde(default)]
    pub endpoint: String,
}

/// Store holding the last known [`GlobalSettings`]; `None` until loaded.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<SettingsInner>,
}

struct SettingsInner {
    client: ApiClient,
    notifications: NotificationQueue,
    settings: Observable<Option<GlobalSettings>>,
}

impl SettingsStore {
    /// Create an empty store
    #[must_use]
    pub fn new(client: ApiClient, notifications: NotificationQueue) -> Self {
        Self {
            inner: Arc::new(SettingsInner {
                client,
                notifications,
                settings: Observable::default(),
            }),
        }
    }

    /// Current settings, if loaded
    #[must_use]
    pub fn settings(&self) -> Option<GlobalSettings> {
        self.inner.settings.get()
    }

    /// Subscribe to settings changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<GlobalSettings>> {
        self.inner.settings.subscribe()
    }

    /// Fetch settings from the backend
    pub async fn load(&self) -> bool {
        match api::settings::get(&self.inner.client).await.into_result() {
            Err(e) => {
                warn!(error = %e, "Failed to load settings");
                self.inner
                    .notifications
                    .error(format!("Failed to load settings: {}", e.error));
                false
            }
            Ok(Some(settings)) => {
                self.inner.settings.set(Some(settings));
                true
            }
            Ok(None) => true,
        }
    }

    /// Replace the settings on the backend, then locally
    pub async fn save(&self, settings: GlobalSettings) -> bool {
        match api::settings::save(&self.inner.client, &settings)
            .await
            .into_result()
        {
            Err(e) => {
                warn!(error = %e, "Failed to save settings");
                self.inner
                    .notifications
                    .error(format!("Failed to save settings: {}", e.error));
                false
            }
            Ok(_) => {
                info!(endpoint = %settings.endpoint, "Settings saved");
                self.inner.settings.set(Some(settings));
                self.inner.notifications.success("Settings saved successfully");
                true
            }
        }
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings())
            .finish()
    }
}
