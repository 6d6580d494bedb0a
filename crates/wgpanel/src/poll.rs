//! Repeating background task
//!
//! A [`PollLoop`] runs an async tick on a fixed interval until told to stop.
//! Ticks run one after another on the same task, so a slow tick delays the
//! next one instead of overlapping it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to a running repeating task
#[derive(Debug)]
pub struct PollLoop {
    name: &'static str,
    /// Sender to signal shutdown to the loop
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep polling
    Continue,
    /// The owner is gone; stop the loop
    Stop,
}

impl PollLoop {
    /// Spawn a loop calling `tick` every `period`, first after one period.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Tick> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(name, ?period, "Poll loop started");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    // Check for shutdown signal
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!(name, "Poll loop received shutdown signal");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // A tick in flight always completes, even if stop is requested meanwhile
                        if tick().await == Tick::Stop {
                            debug!(name, "Poll loop owner dropped");
                            break;
                        }
                    }
                }
            }

            info!(name, "Poll loop stopped");
        });

        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Ask the loop to stop after any in-flight tick
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!(name = self.name, "Poll loop already stopped (receiver dropped)");
        }
    }

    /// Stop the loop and wait for it to exit, aborting after `timeout`
    pub async fn stop_and_wait(self, timeout: Duration) {
        self.stop();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => debug!(name = self.name, "Poll loop stopped gracefully"),
            Ok(Err(e)) => warn!(name = self.name, "Poll loop task failed: {e}"),
            Err(_) => {
                warn!(name = self.name, "Poll loop did not stop within timeout, aborting");
                abort.abort();
            }
        }
    }

    /// Whether the task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
