//! Observable stores kept in sync with the backend
//!
//! Each store follows the same pattern: an operation calls the request layer,
//! applies the result to its [`Observable`](crate::observable::Observable)
//! state on success, and pushes a notification on failure. Operations report
//! failure only through their `bool`/`Option` return value.
//!
//! - [`PeerStore`]: the peer registry, with background status polling
//! - [`SettingsStore`]: global interface settings
//! - [`StatsStore`]: interface counters and traffic history

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::poll::{PollLoop, Tick};

pub mod peers;
pub mod settings;
pub mod stats;

pub use peers::PeerStore;
pub use settings::{GlobalSettings, SettingsStore};
pub use stats::{InterfaceStats, StatsHistoryPoint, StatsStore};

/// Slot holding a store's single background refresh loop.
///
/// At most one live loop exists per slot: starting while running is a no-op,
/// stopping clears the slot so a later start spawns a fresh loop. A closed
/// slot never spawns again.
#[derive(Debug, Default)]
pub(crate) struct PollSlot {
    current: Mutex<Option<PollLoop>>,
    closed: AtomicBool,
}

impl PollSlot {
    /// Start polling unless a loop is already live or the slot is closed.
    /// Returns whether one was spawned.
    ///
    /// The loop only holds `owner` weakly and ends once the owner is dropped.
    pub(crate) fn start<T, F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        owner: Weak<T>,
        tick: F,
    ) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock();
        if self.closed.load(Ordering::SeqCst) {
            debug!(name, "Polling refused, slot is closed");
            return false;
        }
        if current.as_ref().is_some_and(|p| !p.is_finished()) {
            debug!(name, "Polling already active");
            return false;
        }

        *current = Some(PollLoop::spawn(name, period, move || {
            let pending = owner.upgrade().map(&tick);
            async move {
                match pending {
                    Some(fut) => {
                        fut.await;
                        Tick::Continue
                    }
                    None => Tick::Stop,
                }
            }
        }));
        true
    }

    /// Signal the loop to stop and clear the slot. Returns whether one was live.
    pub(crate) fn stop(&self) -> bool {
        match self.current.lock().take() {
            Some(poll) => {
                poll.stop();
                true
            }
            None => false,
        }
    }

    /// Stop the loop and wait for it to exit
    pub(crate) async fn stop_and_wait(&self, timeout: Duration) {
        let taken = self.current.lock().take();
        if let Some(poll) = taken {
            poll.stop_and_wait(timeout).await;
        }
    }

    /// Close the slot for good and wait for any live loop to exit
    pub(crate) async fn close(&self, timeout: Duration) {
        self.closed.store(true, Ordering::SeqCst);
        self.stop_and_wait(timeout).await;
    }

    /// Whether a live loop occupies the slot
    pub(crate) fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }
}
