//! Transient user notifications
//!
//! Every store operation reports its outcome by pushing a [`Notification`]
//! onto a shared [`NotificationQueue`]. Entries keep insertion order and each
//! one may carry its own expiry; an entry without a duration stays until it
//! is dismissed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::observable::Observable;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// An operation completed
    Success,
    /// An operation failed
    Error,
    /// Something needs attention
    Warning,
    /// Neutral information
    Info,
}

impl NotificationKind {
    /// How long a notification of this kind is shown by default
    #[must_use]
    pub const fn default_duration(self) -> Duration {
        match self {
            Self::Success | Self::Info => Duration::from_millis(3_000),
            Self::Error => Duration::from_millis(5_000),
            Self::Warning => Duration::from_millis(4_000),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// A queued user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique, never reused identity
    pub id: Uuid,
    /// Severity
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Text shown to the user
    pub message: String,
    /// Time until automatic removal; `None` persists until dismissed
    #[serde(rename = "duration", with = "duration_ms", default)]
    pub duration: Option<Duration>,
}

/// Ordered queue of notifications with per-entry expiry.
///
/// Cloning the queue yields another handle to the same entries.
#[derive(Clone, Default)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    items: Observable<Vec<Notification>>,
    /// Outstanding expiry tasks, at most one per identity
    timers: Mutex<HashMap<Uuid, AbortHandle>>,
}

impl QueueInner {
    fn remove_entry(&self, id: Uuid) -> bool {
        self.items.update_if(|items| {
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        })
    }
}

impl NotificationQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and return its identity.
    ///
    /// A positive `duration` schedules a one-shot removal on the current Tokio
    /// runtime. Outside a runtime the entry is kept until removed explicitly.
    pub fn add(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let duration = duration.filter(|d| !d.is_zero());
        let notification = Notification {
            id,
            kind,
            message: message.into(),
            duration,
        };
        debug!(%id, %kind, message = %notification.message, "Notification queued");

        self.inner.items.update(|items| items.push(notification));

        if let Some(after) = duration {
            self.schedule_expiry(id, after);
        }
        id
    }

    /// Queue a success message with the default duration
    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.with_default(NotificationKind::Success, message)
    }

    /// Queue an error message with the default duration
    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.with_default(NotificationKind::Error, message)
    }

    /// Queue a warning with the default duration
    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.with_default(NotificationKind::Warning, message)
    }

    /// Queue an informational message with the default duration
    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.with_default(NotificationKind::Info, message)
    }

    fn with_default(&self, kind: NotificationKind, message: impl Into<String>) -> Uuid {
        self.add(kind, message, Some(kind.default_duration()))
    }

    fn schedule_expiry(&self, id: Uuid, after: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%id, "No async runtime, notification will not expire on its own");
            return;
        };

        // Held across spawn so the task cannot finish before it is recorded
        let mut timers = self.inner.timers.lock();
        let weak: Weak<QueueInner> = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                inner.timers.lock().remove(&id);
                if inner.remove_entry(id) {
                    debug!(%id, "Notification expired");
                }
            }
        });
        timers.insert(id, task.abort_handle());
    }

    /// Remove a notification. Removing an unknown identity is a no-op.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&self, id: Uuid) -> bool {
        if let Some(timer) = self.inner.timers.lock().remove(&id) {
            timer.abort();
        }
        self.inner.remove_entry(id)
    }

    /// Remove every notification and cancel all pending expiries
    pub fn clear(&self) {
        for (_, timer) in self.inner.timers.lock().drain() {
            timer.abort();
        }
        self.inner.items.set(Vec::new());
    }

    /// Snapshot of the queue in display order
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        self.inner.items.get()
    }

    /// Look up a notification by identity
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Notification> {
        self.inner
            .items
            .with(|items| items.iter().find(|n| n.id == id).cloned())
    }

    /// Number of queued notifications
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.with(Vec::len)
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to changes of the queue
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.items.subscribe()
    }

    /// Number of expiry tasks still pending
    #[must_use]
    pub fn pending_expiries(&self) -> usize {
        self.inner.timers.lock().len()
    }
}

impl fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("len", &self.len())
            .field("pending_expiries", &self.pending_expiries())
            .finish()
    }
}

/// Durations travel as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms: Option<i64> = Option::deserialize(d)?;
        Ok(ms
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}
