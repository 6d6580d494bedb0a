//! Peer data model
//!
//! These types mirror the JSON exchanged with the management backend. The
//! only client-owned field is [`Peer::status`], which is derived locally from
//! [`Peer::last_handshake`] and never sent back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{derive_status_with_timeout, PeerStatus, NEVER_HANDSHAKE};

/// A registered WireGuard peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Stable identity (the peer's public key)
    pub id: String,
    /// WireGuard public key (base64)
    pub public_key: String,
    /// Display label
    pub name: String,
    /// Public `ip:port` the kernel last saw the peer at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// CIDR ranges routed to this peer, in display order
    #[serde(rename = "allowedIPs", default)]
    pub allowed_ips: Vec<String>,
    /// Last handshake timestamp, or `"0"` if the peer never connected
    #[serde(default = "never")]
    pub last_handshake: String,
    /// Bytes received from the peer
    #[serde(default)]
    pub receive_bytes: u64,
    /// Bytes sent to the peer
    #[serde(default)]
    pub transmit_bytes: u64,
    /// Derived liveness; recomputed on every read, never sent to the backend
    #[serde(default)]
    pub status: PeerStatus,
    /// DNS server pushed to the client config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// Interface MTU for the client config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Keepalive interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u32>,
    /// Whether a preshared key is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<bool>,
    /// Address assigned to the client side of the tunnel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_address: Option<String>,
}

fn never() -> String {
    NEVER_HANDSHAKE.to_string()
}

impl Peer {
    /// Recompute [`Peer::status`] against `now`
    pub fn refresh_status(&mut self, now: DateTime<Utc>, timeout: std::time::Duration) {
        self.status = derive_status_with_timeout(&self.last_handshake, now, timeout);
    }

    /// Consume the peer, returning it with a freshly derived status
    #[must_use]
    pub fn with_status(mut self, now: DateTime<Utc>, timeout: std::time::Duration) -> Self {
        self.refresh_status(now, timeout);
        self
    }

    /// Whether the peer has ever completed a handshake
    #[must_use]
    pub fn has_connected(&self) -> bool {
        crate::status::parse_handshake(&self.last_handshake).is_some()
    }
}

/// Input for creating a peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerFormData {
    /// Display label (required)
    pub name: String,
    /// CIDR ranges for the peer
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    /// Existing public key; the backend generates a keypair when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// DNS server for the client config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// MTU for the client config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Keepalive interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u32>,
    /// Ask the backend to generate a preshared key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<bool>,
}

impl PeerFormData {
    /// Form with the two required fields
    pub fn new(name: impl Into<String>, allowed_ips: Vec<String>) -> Self {
        Self {
            name: name.into(),
            allowed_ips,
            ..Self::default()
        }
    }
}

/// Response to peer creation and key regeneration.
///
/// `private_key` and `preshared_key` are only ever returned here; the backend
/// does not keep them, so this is the caller's one chance to save them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCreateResponse {
    /// Server-assigned identity
    pub id: String,
    /// Public key
    pub public_key: String,
    /// Display label
    #[serde(default)]
    pub name: String,
    /// CIDR ranges
    #[serde(rename = "allowedIPs", default)]
    pub allowed_ips: Vec<String>,
    /// Complete client `.conf` file
    #[serde(default)]
    pub config: String,
    /// Generated private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Generated preshared key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<String>,
}

/// Partial update of a peer.
///
/// Only fields set to `Some` are sent, so the backend leaves the rest alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerUpdate {
    /// New display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New CIDR ranges
    #[serde(rename = "allowedIPs", default, skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<Vec<String>>,
    /// New DNS server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// New MTU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// New keepalive interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u32>,
    /// New client tunnel address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_address: Option<String>,
}

impl PeerUpdate {
    /// Set the name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the allowed IPs
    #[must_use]
    pub fn allowed_ips(mut self, ips: Vec<String>) -> Self {
        self.allowed_ips = Some(ips);
        self
    }

    /// Set the DNS server
    #[must_use]
    pub fn dns(mut self, dns: impl Into<String>) -> Self {
        self.dns = Some(dns.into());
        self
    }

    /// Set the MTU
    #[must_use]
    pub const fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Set the keepalive interval
    #[must_use]
    pub const fn persistent_keepalive(mut self, secs: u32) -> Self {
        self.persistent_keepalive = Some(secs);
        self
    }

    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy the set fields onto a local peer
    pub fn apply_to(&self, peer: &mut Peer) {
        if let Some(name) = &self.name {
            peer.name.clone_from(name);
        }
        if let Some(ips) = &self.allowed_ips {
            peer.allowed_ips.clone_from(ips);
        }
        if let Some(dns) = &self.dns {
            peer.dns = Some(dns.clone());
        }
        if let Some(mtu) = self.mtu {
            peer.mtu = Some(mtu);
        }
        if let Some(keepalive) = self.persistent_keepalive {
            peer.persistent_keepalive = Some(keepalive);
        }
        if let Some(addr) = &self.interface_address {
            peer.interface_address = Some(addr.clone());
        }
    }
}
