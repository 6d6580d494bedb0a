//! # wgpanel - Client-side state engine for a WireGuard administration panel
//!
//! wgpanel keeps a local, observable picture of a WireGuard server's peers,
//! interface statistics and global settings in sync with the management
//! backend. The backend is the source of truth; the client only derives the
//! online/offline status of each peer and queues transient notifications
//! describing the outcome of every operation.
//!
//! ## Features
//!
//! - **Never-throwing request layer**: every transport or protocol failure is
//!   normalized into an [`ApiError`] value.
//! - **Observable stores**: peers, settings and stats are single-writer,
//!   multi-reader containers built on `tokio::sync::watch`.
//! - **Background polling**: a single repeating refresh per store that never
//!   overlaps itself and never produces user-visible noise.
//! - **Self-expiring notifications**: each message carries its own expiry
//!   timer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wgpanel::{Config, Panel, PeerFormData};
//!
//! #[tokio::main]
//! async fn main() -> wgpanel::Result<()> {
//!     let panel = Panel::new(Config::new("http://localhost:8080"))?;
//!
//!     // Full reload from the backend
//!     panel.peers().load().await;
//!
//!     // Create a peer; the response carries one-time key material
//!     let form = PeerFormData::new("phone", vec!["10.0.0.5/32".to_string()]);
//!     if let Some(created) = panel.peers().add(form).await {
//!         println!("{}", created.config);
//!     }
//!
//!     // Keep statuses fresh in the background
//!     panel.peers().start_polling();
//!
//!     for note in panel.notifications().list() {
//!         println!("[{}] {}", note.kind, note.message);
//!     }
//!
//!     panel.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`api`]: Error-normalizing HTTP request layer and endpoint wrappers
//! - [`config`]: Configuration for the panel
//! - [`error`]: Error types and Result alias
//! - [`format`]: Display helpers (byte counts, relative handshake times)
//! - [`notification`]: Self-expiring notification queue
//! - [`panel`]: The [`Panel`] context object owning every store
//! - [`peer`]: Peer data model
//! - [`status`]: Online/offline derivation from handshake timestamps
//! - [`store`]: Peer, settings and stats stores
//!
//! ## Internal Modules
//!
//! - [`observable`]: Watch-backed observable container
//! - [`poll`]: Repeating background task handle

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]

// =============================================================================
// Public modules - stable API
// =============================================================================

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod notification;
pub mod panel;
pub mod peer;
pub mod status;
pub mod store;

// =============================================================================
// Internal modules - not part of stable API
// =============================================================================

#[doc(hidden)]
pub mod observable;

#[doc(hidden)]
pub mod poll;

// =============================================================================
// Public re-exports - the primary public API
// =============================================================================

pub use api::{ApiClient, ApiError, ApiResponse};
pub use config::Config;
pub use error::{Error, Result};
pub use notification::{Notification, NotificationKind, NotificationQueue};
pub use panel::Panel;
pub use peer::{Peer, PeerCreateResponse, PeerFormData, PeerUpdate};
pub use status::{derive_status, PeerStatus};
pub use store::{
    GlobalSettings, InterfaceStats, PeerStore, SettingsStore, StatsHistoryPoint, StatsStore,
};

// =============================================================================
// Constants
// =============================================================================

/// Default base URL of the management backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// A peer is online if its last handshake is at most this many milliseconds old.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 120_000;

/// Default interval of the background peer refresh, in milliseconds.
///
/// Can be configured via [`Config::with_peer_poll_interval`].
pub const DEFAULT_PEER_POLL_INTERVAL_MS: u64 = 5_000;

/// Default interval of the background stats refresh, in milliseconds.
///
/// Can be configured via [`Config::with_stats_poll_interval`].
pub const DEFAULT_STATS_POLL_INTERVAL_MS: u64 = 10_000;

/// Default timeout for a single backend request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
