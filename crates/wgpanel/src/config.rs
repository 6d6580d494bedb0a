//! Configuration for the wgpanel client.
//!
//! This module provides the [`Config`] struct. Configuration covers the
//! backend location, request timeout, polling intervals and the handshake
//! window used to classify peers as online.
//!
//! # Example
//!
//! ```rust
//! use wgpanel::Config;
//!
//! // Simple configuration with just a backend URL
//! let config = Config::new("http://10.0.0.1:8080");
//!
//! // Full configuration with builder pattern
//! let config = Config::new("http://10.0.0.1:8080")
//!     .with_peer_poll_interval(2_000)
//!     .with_stats_poll_interval(15_000)
//!     .with_request_timeout(5);
//!
//! // Defaults, overridden by WGPANEL_* environment variables
//! let config = Config::from_env();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::{
    DEFAULT_API_BASE_URL, DEFAULT_PEER_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_STATS_POLL_INTERVAL_MS, HANDSHAKE_TIMEOUT_MS,
};

/// Environment variable overriding [`Config::api_base_url`].
pub const ENV_API_BASE_URL: &str = "WGPANEL_API_BASE_URL";
/// Environment variable overriding [`Config::peer_poll_interval_ms`].
pub const ENV_PEER_POLL_INTERVAL_MS: &str = "WGPANEL_PEER_POLL_INTERVAL_MS";
/// Environment variable overriding [`Config::stats_poll_interval_ms`].
pub const ENV_STATS_POLL_INTERVAL_MS: &str = "WGPANEL_STATS_POLL_INTERVAL_MS";
/// Environment variable overriding [`Config::request_timeout_secs`].
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "WGPANEL_REQUEST_TIMEOUT_SECS";

/// Configuration for a [`Panel`](crate::Panel).
///
/// # Defaults
///
/// - `api_base_url`: `http://localhost:8080`
/// - `peer_poll_interval_ms`: 5000
/// - `stats_poll_interval_ms`: 10000
/// - `request_timeout_secs`: 10
/// - `handshake_timeout_ms`: 120000
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the management backend, e.g. `http://10.0.0.1:8080`.
    ///
    /// Endpoint paths such as `/peers` are appended to it verbatim.
    pub api_base_url: String,

    /// Interval of the background peer refresh in milliseconds.
    pub peer_poll_interval_ms: u64,

    /// Interval of the background stats refresh in milliseconds.
    pub stats_poll_interval_ms: u64,

    /// Timeout for a single backend request in seconds.
    ///
    /// A request that times out is reported as a network error.
    pub request_timeout_secs: u64,

    /// Maximum handshake age, in milliseconds, for a peer to count as online.
    pub handshake_timeout_ms: u64,
}

impl Config {
    /// Create a new configuration pointing at the given backend
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            peer_poll_interval_ms: DEFAULT_PEER_POLL_INTERVAL_MS,
            stats_poll_interval_ms: DEFAULT_STATS_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
        }
    }

    /// Build a configuration from defaults overlaid with `WGPANEL_*` variables.
    ///
    /// Values that fail to parse are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values looked up by environment variable name.
    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(ms) = parse_var(&lookup, ENV_PEER_POLL_INTERVAL_MS) {
            self.peer_poll_interval_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, ENV_STATS_POLL_INTERVAL_MS) {
            self.stats_poll_interval_ms = ms;
        }
        if let Some(secs) = parse_var(&lookup, ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = secs;
        }
        self
    }

    /// Set the backend base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the peer poll interval in milliseconds
    #[must_use]
    pub const fn with_peer_poll_interval(mut self, ms: u64) -> Self {
        self.peer_poll_interval_ms = ms;
        self
    }

    /// Set the stats poll interval in milliseconds
    #[must_use]
    pub const fn with_stats_poll_interval(mut self, ms: u64) -> Self {
        self.stats_poll_interval_ms = ms;
        self
    }

    /// Set the request timeout in seconds
    #[must_use]
    pub const fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the handshake window in milliseconds
    #[must_use]
    pub const fn with_handshake_timeout(mut self, ms: u64) -> Self {
        self.handshake_timeout_ms = ms;
        self
    }

    /// Peer poll interval as a [`Duration`]
    #[must_use]
    pub const fn peer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.peer_poll_interval_ms)
    }

    /// Stats poll interval as a [`Duration`]
    #[must_use]
    pub const fn stats_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stats_poll_interval_ms)
    }

    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Handshake window as a [`Duration`]
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| Error::config(format!("invalid api base url {:?}: {e}", self.api_base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported url scheme {:?}",
                url.scheme()
            )));
        }
        if self.peer_poll_interval_ms == 0 {
            return Err(Error::config("peer poll interval must be positive"));
        }
        if self.stats_poll_interval_ms == 0 {
            return Err(Error::config("stats poll interval must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request timeout must be positive"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring unparsable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.peer_poll_interval_ms, DEFAULT_PEER_POLL_INTERVAL_MS);
        assert_eq!(config.stats_poll_interval_ms, DEFAULT_STATS_POLL_INTERVAL_MS);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("https://vpn.example.com")
            .with_peer_poll_interval(1_000)
            .with_stats_poll_interval(2_000)
            .with_request_timeout(3);

        assert_eq!(config.api_base_url, "https://vpn.example.com");
        assert_eq!(config.peer_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.stats_poll_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "http://10.8.0.1:9000"),
            (ENV_PEER_POLL_INTERVAL_MS, "250"),
            (ENV_STATS_POLL_INTERVAL_MS, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().overlay(|k| vars.get(k).map(ToString::to_string));
        assert_eq!(config.api_base_url, "http://10.8.0.1:9000");
        assert_eq!(config.peer_poll_interval_ms, 250);
        // Garbage is ignored, the default survives
        assert_eq!(config.stats_poll_interval_ms, DEFAULT_STATS_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_config_validate() {
        assert!(Config::new("not a url").validate().is_err());
        assert!(Config::new("ftp://example.com").validate().is_err());
        assert!(Config::default().with_peer_poll_interval(0).validate().is_err());
        assert!(Config::default().with_request_timeout(0).validate().is_err());
    }
}
