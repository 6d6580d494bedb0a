//! Display helpers
//!
//! Human-readable renderings of byte counts and handshake times, plus the
//! bits needed to save a client configuration to disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::peer::PeerCreateResponse;
use crate::status::{parse_handshake, NEVER_HANDSHAKE};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with a 1024 base, e.g. `1.5 KB`.
///
/// At most two decimals are shown and trailing zeros are dropped.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut scale = 1u64;
    while unit + 1 < BYTE_UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        unit += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64 / scale as f64;
    let mut formatted = format!("{value:.2}");
    if formatted.contains('.') {
        formatted = formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }
    format!("{formatted} {}", BYTE_UNITS[unit])
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Render a handshake timestamp relative to `now`, e.g. `2 minutes ago`.
///
/// The never-connected sentinel, an empty string and unparsable values all
/// render as `Never`. Timestamps ahead of `now` count as zero seconds ago.
#[must_use]
pub fn format_last_handshake(last_handshake: &str, now: DateTime<Utc>) -> String {
    if last_handshake.is_empty() || last_handshake == NEVER_HANDSHAKE {
        return "Never".to_string();
    }
    let Some(at) = parse_handshake(last_handshake) else {
        return "Never".to_string();
    };

    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => plural(secs, "second"),
        60..=3_599 => plural(secs / 60, "minute"),
        3_600..=86_399 => plural(secs / 3_600, "hour"),
        _ => plural(secs / 86_400, "day"),
    }
}

/// File name for a peer's client configuration: `laptop 2` becomes `laptop_2.conf`
#[must_use]
pub fn config_file_name(peer_name: &str) -> String {
    let stem: String = peer_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.conf")
}

/// Client configuration for a freshly created peer.
///
/// Uses the configuration rendered by the server; only when that is missing
/// is a template with placeholders produced.
#[must_use]
pub fn fallback_client_config(response: &PeerCreateResponse) -> String {
    if !response.config.is_empty() {
        return response.config.clone();
    }

    warn!(peer_id = %response.id, "No config in create response, using template");
    format!(
        "[Interface]\n\
         PrivateKey = {}\n\
         Address = {}\n\
         DNS = 1.1.1.1\n\
         \n\
         [Peer]\n\
         PublicKey = {}\n\
         Endpoint = <SERVER_ENDPOINT>:51820\n\
         AllowedIPs = 0.0.0.0/0, ::/0\n\
         PersistentKeepalive = 25",
        response.private_key.as_deref().unwrap_or("<PRIVATE_KEY>"),
        response.allowed_ips.join(", "),
        response.public_key,
    )
}

/// Write a client configuration into `dir` under [`config_file_name`]
pub fn write_config_file(dir: &Path, peer_name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(config_file_name(peer_name));
    std::fs::write(&path, contents)?;
    debug!(path = %path.display(), "Wrote client config");
    Ok(path)
}
