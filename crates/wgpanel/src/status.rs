//! Peer liveness derivation
//!
//! The backend reports when each peer last completed a handshake; whether a
//! peer is online is decided client-side. A peer is online when its last
//! handshake is no older than [`HANDSHAKE_TIMEOUT_MS`] at the moment of
//! derivation.
//!
//! The functions here are pure and cheap, so the status can be recomputed on
//! every read without caching.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::HANDSHAKE_TIMEOUT_MS;

/// Handshake value the backend uses for a peer that never connected.
pub const NEVER_HANDSHAKE: &str = "0";

/// Liveness of a peer, derived from its last handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// Handshake within the timeout window
    Online,
    /// No handshake, an unreadable one, or one older than the window
    #[default]
    Offline,
}

impl PeerStatus {
    /// Whether this is [`PeerStatus::Online`]
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Offline => "offline",
        })
    }
}

/// Derive a peer's status using the default 120 second window.
#[must_use]
pub fn derive_status(last_handshake: &str, now: DateTime<Utc>) -> PeerStatus {
    derive_status_with_timeout(
        last_handshake,
        now,
        Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
    )
}

/// Derive a peer's status with an explicit handshake window.
///
/// The sentinel `"0"`, an empty string and any value that does not parse as a
/// timestamp are all offline. A handshake exactly `timeout` old is still
/// online.
#[must_use]
pub fn derive_status_with_timeout(
    last_handshake: &str,
    now: DateTime<Utc>,
    timeout: Duration,
) -> PeerStatus {
    let Some(handshake) = parse_handshake(last_handshake) else {
        return PeerStatus::Offline;
    };
    let window = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
    if now.signed_duration_since(handshake) <= window {
        PeerStatus::Online
    } else {
        PeerStatus::Offline
    }
}

/// Parse a handshake timestamp as reported by the backend.
///
/// Accepted forms:
/// - RFC 3339 (`2026-01-31T02:00:00Z`, `2026-01-31T04:00:00+02:00`)
/// - naive date-time, read as UTC (`2026-01-31 02:00:00`, `2026-01-31T02:00:00.5`)
/// - Go's `time.Time` string form (`2026-01-31 02:00:00.123 +0000 UTC m=+1.5`)
///
/// Returns `None` for the never-connected sentinel and for anything else.
#[must_use]
pub fn parse_handshake(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NEVER_HANDSHAKE {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    // Go appends the monotonic clock reading after " m="
    let raw = raw.split(" m=").next().unwrap_or(raw).trim_end();

    if let Some(ts) = parse_go_time(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `2006-01-02 15:04:05.999999999 -0700 MST`, zone abbreviation optional.
fn parse_go_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let mut parts = raw.split_whitespace();
    let (date, time, offset) = (parts.next()?, parts.next()?, parts.next()?);
    let candidate = format!("{date} {time} {offset}");
    ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S %z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&candidate, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sentinels_are_offline() {
        for t in [now(), Utc::now(), DateTime::<Utc>::MIN_UTC] {
            assert_eq!(derive_status("0", t), PeerStatus::Offline);
            assert_eq!(derive_status("", t), PeerStatus::Offline);
        }
    }

    #[test]
    fn test_window_boundary() {
        let at = |ms: i64| (now() - TimeDelta::milliseconds(ms)).to_rfc3339();

        assert_eq!(derive_status(&at(10_000), now()), PeerStatus::Online);
        assert_eq!(derive_status(&at(120_000), now()), PeerStatus::Online);
        assert_eq!(derive_status(&at(120_001), now()), PeerStatus::Offline);
        assert_eq!(derive_status(&at(3_600_000), now()), PeerStatus::Offline);
    }

    #[test]
    fn test_future_handshake_is_online() {
        let ahead = (now() + TimeDelta::seconds(5)).to_rfc3339();
        assert_eq!(derive_status(&ahead, now()), PeerStatus::Online);
    }

    #[test]
    fn test_unparsable_is_offline() {
        assert_eq!(derive_status("yesterday", now()), PeerStatus::Offline);
        assert_eq!(derive_status("2026-13-45 99:00:00", now()), PeerStatus::Offline);
    }

    #[test]
    fn test_custom_timeout() {
        let ts = (now() - TimeDelta::seconds(30)).to_rfc3339();
        let short = Duration::from_secs(10);
        assert_eq!(derive_status_with_timeout(&ts, now(), short), PeerStatus::Offline);
    }

    #[test]
    fn test_parse_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 31, 2, 0, 0).unwrap();

        assert_eq!(parse_handshake("2026-01-31T02:00:00Z"), Some(expected));
        assert_eq!(parse_handshake("2026-01-31T04:00:00+02:00"), Some(expected));
        assert_eq!(parse_handshake("2026-01-31 02:00:00"), Some(expected));
        assert_eq!(parse_handshake("2026-01-31T02:00:00"), Some(expected));
        assert_eq!(parse_handshake("2026-01-31 02:00:00 +0000 UTC"), Some(expected));
        assert_eq!(
            parse_handshake("2026-01-31 03:00:00 +0100 CET m=+12.000000001"),
            Some(expected)
        );
        assert!(parse_handshake("2026-01-31 02:00:00.250 +0000 UTC").is_some());
        assert_eq!(parse_handshake("0"), None);
        assert_eq!(parse_handshake("  "), None);
    }

    #[test]
    fn test_go_zero_time_is_offline() {
        assert_eq!(
            derive_status("0001-01-01 00:00:00 +0000 UTC", now()),
            PeerStatus::Offline
        );
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&PeerStatus::Online).unwrap(), "\"online\"");
        let s: PeerStatus = serde_json::from_str("\"offline\"").unwrap();
        assert_eq!(s, PeerStatus::Offline);
        assert_eq!(PeerStatus::default(), PeerStatus::Offline);
    }
}
