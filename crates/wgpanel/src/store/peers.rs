//! Peer registry store
//!
//! [`PeerStore`] owns the client-side list of peers. Full reloads replace the
//! list wholesale; `update` and `remove` patch single entries by identity so
//! that unrelated rows keep their position. Responses are applied in the order
//! they arrive, so a slow response can overwrite a newer one (last write wins).
//!
//! # Example
//!
//! ```rust,no_run
//! # use wgpanel::{Config, Panel, PeerUpdate};
//! # async fn example() -> wgpanel::Result<()> {
//! let panel = Panel::new(Config::default())?;
//! let peers = panel.peers();
//!
//! peers.load().await;
//! for peer in peers.peers() {
//!     println!("{} {}", peer.name, peer.status);
//! }
//!
//! peers.update("pk1=", PeerUpdate::default().name("laptop")).await;
//! peers.start_polling();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::PollSlot;
use crate::api::{self, ApiClient};
use crate::config::Config;
use crate::notification::{NotificationKind, NotificationQueue};
use crate::observable::Observable;
use crate::peer::{Peer, PeerCreateResponse, PeerFormData, PeerUpdate};

/// How long the "keys regenerated" reminder stays visible.
const REGENERATED_NOTICE: Duration = Duration::from_millis(5_000);

/// Client-side peer registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct PeerStore {
    inner: Arc<PeerStoreInner>,
}

struct PeerStoreInner {
    client: ApiClient,
    notifications: NotificationQueue,
    /// Peers in backend order
    peers: Observable<Vec<Peer>>,
    poller: PollSlot,
    poll_interval: Duration,
    handshake_timeout: Duration,
}

impl PeerStore {
    /// Create an empty store
    #[must_use]
    pub fn new(client: ApiClient, notifications: NotificationQueue, config: &Config) -> Self {
        Self {
            inner: Arc::new(PeerStoreInner {
                client,
                notifications,
                peers: Observable::default(),
                poller: PollSlot::default(),
                poll_interval: config.peer_poll_interval(),
                handshake_timeout: config.handshake_timeout(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Snapshot of all peers
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.peers.get()
    }

    /// Look up a peer by identity
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Peer> {
        self.inner
            .peers
            .with(|peers| peers.iter().find(|p| p.id == id).cloned())
    }

    /// Number of peers currently online
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.inner
            .peers
            .with(|peers| peers.iter().filter(|p| p.status.is_online()).count())
    }

    /// Subscribe to changes of the peer list
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Peer>> {
        self.inner.peers.subscribe()
    }

    /// Re-derive every status against the current time without a backend call.
    ///
    /// Subscribers are only woken when a status actually flipped.
    pub fn refresh_statuses(&self) {
        let now = Utc::now();
        let timeout = self.inner.handshake_timeout;
        self.inner.peers.update_if(|peers| {
            let mut changed = false;
            for peer in peers.iter_mut() {
                let before = peer.status;
                peer.refresh_status(now, timeout);
                changed |= peer.status != before;
            }
            changed
        });
    }

    // -------------------------------------------------------------------------
    // Remote operations
    // -------------------------------------------------------------------------

    /// Reload every peer from the backend.
    ///
    /// On failure an error notification is queued and the current list is kept.
    pub async fn load(&self) -> bool {
        self.load_with(false).await
    }

    /// Reload without queuing a notification on failure (background refresh)
    pub async fn load_silent(&self) -> bool {
        self.load_with(true).await
    }

    async fn load_with(&self, silent: bool) -> bool {
        match api::peers::list(&self.inner.client).await.into_result() {
            Err(e) => {
                if silent {
                    debug!(error = %e, "Background peer refresh failed");
                } else {
                    warn!(error = %e, "Failed to load peers");
                    self.inner
                        .notifications
                        .error(format!("Failed to load peers: {}", e.error));
                }
                false
            }
            Ok(Some(peers)) => {
                let now = Utc::now();
                let timeout = self.inner.handshake_timeout;
                let peers: Vec<Peer> = peers
                    .into_iter()
                    .map(|p| p.with_status(now, timeout))
                    .collect();
                debug!(count = peers.len(), silent, "Peers loaded");
                self.inner.peers.set(peers);
                true
            }
            Ok(None) => {
                debug!("Peer list response had no body, keeping current list");
                true
            }
        }
    }

    /// Create a peer and reload the list.
    ///
    /// Returns the creation payload, which may contain key material the
    /// backend will never hand out again.
    pub async fn add(&self, form: PeerFormData) -> Option<PeerCreateResponse> {
        match api::peers::create(&self.inner.client, &form).await.into_result() {
            Err(e) => {
                warn!(name = %form.name, error = %e, "Failed to add peer");
                self.inner
                    .notifications
                    .error(format!("Failed to add peer: {}", e.error));
                None
            }
            Ok(Some(created)) => {
                info!(peer_id = %created.id, name = %form.name, "Peer added");
                self.inner
                    .notifications
                    .success(format!("Peer \"{}\" added successfully!", form.name));
                // The create response lacks fields the list carries
                self.load().await;
                Some(created)
            }
            Ok(None) => {
                warn!(name = %form.name, "Peer creation returned no payload");
                None
            }
        }
    }

    /// Update the given fields of a peer and patch the local entry in place.
    ///
    /// Other entries, and the entry's position, are left untouched. Returns
    /// whether the backend accepted the update; read the patched entry with
    /// [`PeerStore::get`].
    pub async fn update(&self, id: &str, update: PeerUpdate) -> bool {
        let response = api::peers::update(&self.inner.client, id, &update).await;
        match response.into_result() {
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Failed to update peer");
                self.inner
                    .notifications
                    .error(format!("Failed to update peer: {}", e.error));
                false
            }
            Ok(returned) => {
                let now = Utc::now();
                let timeout = self.inner.handshake_timeout;
                let patched = self.inner.peers.update_if(|peers| {
                    let Some(slot) = peers.iter_mut().find(|p| p.id == id) else {
                        return false;
                    };
                    match returned {
                        Some(record) => *slot = record.with_status(now, timeout),
                        // No record echoed back: apply what we sent
                        None => {
                            update.apply_to(slot);
                            slot.refresh_status(now, timeout);
                        }
                    }
                    true
                });
                info!(peer_id = %id, "Peer updated");
                if !patched {
                    debug!(peer_id = %id, "Updated peer is not in the local list");
                }
                true
            }
        }
    }

    /// Regenerate a peer's keys and reload the list.
    ///
    /// The returned payload holds the new client configuration.
    pub async fn regenerate_keys(&self, id: &str) -> Option<PeerCreateResponse> {
        match api::peers::regenerate_keys(&self.inner.client, id)
            .await
            .into_result()
        {
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Failed to regenerate keys");
                self.inner
                    .notifications
                    .error(format!("Failed to regenerate keys: {}", e.error));
                None
            }
            Ok(Some(regenerated)) => {
                info!(peer_id = %id, "Peer keys regenerated");
                let label = if regenerated.name.is_empty() {
                    id.to_string()
                } else {
                    regenerated.name.clone()
                };
                self.inner.notifications.add(
                    NotificationKind::Success,
                    format!(
                        "Keys regenerated for \"{label}\". Download and save the new configuration; the previous one no longer works."
                    ),
                    Some(REGENERATED_NOTICE),
                );
                self.load().await;
                Some(regenerated)
            }
            Ok(None) => {
                warn!(peer_id = %id, "Key regeneration returned no payload");
                None
            }
        }
    }

    /// Fetch a peer's client configuration as raw text
    pub async fn get_config(&self, id: &str) -> Option<String> {
        match api::peers::config(&self.inner.client, id).await.into_result() {
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Failed to fetch peer config");
                self.inner
                    .notifications
                    .error(format!("Failed to fetch peer config: {}", e.error));
                None
            }
            Ok(config) => config,
        }
    }

    /// Fetch a PNG QR code of a peer's client configuration
    pub async fn get_qr(&self, id: &str) -> Option<Bytes> {
        match api::peers::qr(&self.inner.client, id).await.into_result() {
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Failed to fetch QR code");
                self.inner
                    .notifications
                    .error(format!("Failed to fetch QR code: {}", e.error));
                None
            }
            Ok(image) => image,
        }
    }

    /// Delete a peer and drop it from the local list without a reload.
    ///
    /// `display_name` is only used in notifications.
    pub async fn remove(&self, id: &str, display_name: &str) -> bool {
        match api::peers::remove(&self.inner.client, id).await.into_result() {
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Failed to remove peer");
                self.inner.notifications.error(format!(
                    "Failed to remove peer \"{display_name}\": {}",
                    e.error
                ));
                false
            }
            Ok(_) => {
                info!(peer_id = %id, "Peer removed");
                self.inner
                    .notifications
                    .success(format!("Peer \"{display_name}\" removed successfully!"));
                self.inner.peers.update_if(|peers| {
                    let before = peers.len();
                    peers.retain(|p| p.id != id);
                    peers.len() != before
                });
                true
            }
        }
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    /// Start the background refresh. Starting twice has no further effect,
    /// and neither does starting after the panel has shut down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_polling(&self) {
        let started = self.inner.poller.start(
            "peers",
            self.inner.poll_interval,
            Arc::downgrade(&self.inner),
            |inner| async move {
                PeerStore { inner }.load_silent().await;
            },
        );
        if started {
            debug!(interval = ?self.inner.poll_interval, "Peer polling started");
        }
    }

    /// Stop the background refresh. A refresh already in flight still applies.
    pub fn stop_polling(&self) {
        if self.inner.poller.stop() {
            debug!("Peer polling stopped");
        }
    }

    /// Whether the background refresh is running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Stop polling for good and wait for the loop to exit
    pub(crate) async fn shutdown(&self, timeout: Duration) {
        self.inner.poller.close(timeout).await;
    }
}

impl std::fmt::Debug for PeerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerStore")
            .field("peers", &self.inner.peers.with(Vec::len))
            .field("polling", &self.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PeerStatus;

    fn store() -> PeerStore {
        // Port 9 (discard) on localhost: nothing listens, every call fails fast
        let config = Config::new("http://127.0.0.1:9").with_request_timeout(2);
        let client = ApiClient::new(&config).unwrap();
        PeerStore::new(client, NotificationQueue::new(), &config)
    }

    fn peer(id: &str, last_handshake: &str) -> Peer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "publicKey": id,
            "name": id,
            "allowedIPs": [],
            "lastHandshake": last_handshake,
        }))
        .unwrap()
    }

    #[test]
    fn test_refresh_statuses() {
        let store = store();
        let recent = (Utc::now() - chrono::TimeDelta::seconds(5)).to_rfc3339();
        store
            .inner
            .peers
            .set(vec![peer("a", &recent), peer("b", "0")]);

        let rx = store.subscribe();
        store.refresh_statuses();
        assert!(rx.has_changed().unwrap());
        assert_eq!(store.get("a").unwrap().status, PeerStatus::Online);
        assert_eq!(store.get("b").unwrap().status, PeerStatus::Offline);
        assert_eq!(store.online_count(), 1);

        // Nothing flips the second time round
        let rx = store.subscribe();
        store.refresh_statuses();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_state_and_notifies() {
        let store = store();
        store.inner.peers.set(vec![peer("a", "0")]);

        assert!(!store.load().await);
        assert_eq!(store.peers().len(), 1);

        let notes = store.inner.notifications.list();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Error);
        assert_eq!(notes[0].message, "Failed to load peers: Network error");
        assert_eq!(notes[0].duration, Some(Duration::from_millis(5_000)));
    }

    #[tokio::test]
    async fn test_silent_load_is_quiet() {
        let store = store();
        assert!(!store.load_silent().await);
        assert!(store.inner.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_polling_start_stop() {
        let store = store();
        assert!(!store.is_polling());

        store.start_polling();
        store.start_polling();
        assert!(store.is_polling());

        store.stop_polling();
        assert!(!store.is_polling());
        // Stopping again is a no-op
        store.stop_polling();

        store.start_polling();
        assert!(store.is_polling());
        store.shutdown(Duration::from_secs(1)).await;
        assert!(!store.is_polling());
    }
}
