//! Observable state container
//!
//! Every store exposes its state as an [`Observable`]: one writer (the store
//! itself, through the crate-private mutators) and any number of readers that
//! either take snapshots or subscribe to changes.

use tokio::sync::watch;

/// Single-writer, multi-reader container backed by a `watch` channel.
///
/// Each write replaces or patches the value atomically and wakes every
/// subscriber. Readers never block the writer for longer than a clone.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    /// Create a container holding `initial`
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Subscribe to future writes.
    ///
    /// The receiver starts out with the current value marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replace the value and notify subscribers
    pub(crate) fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Patch the value in place and notify subscribers
    pub(crate) fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Patch the value in place; subscribers are only notified when `f`
    /// reports a modification. Returns what `f` returned.
    pub(crate) fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let obs = Observable::new(vec![1, 2]);
        assert_eq!(obs.get(), vec![1, 2]);

        // Writes succeed with no subscribers attached
        obs.set(vec![3]);
        assert_eq!(obs.get(), vec![3]);

        obs.update(|v| v.push(4));
        assert_eq!(obs.with(Vec::len), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_writes() {
        let obs: Observable<Vec<&str>> = Observable::default();
        let mut rx1 = obs.subscribe();
        let mut rx2 = obs.subscribe();
        assert!(!rx1.has_changed().unwrap());

        obs.update(|v| v.push("a"));

        rx1.changed().await.unwrap();
        rx2.changed().await.unwrap();
        assert_eq!(*rx1.borrow_and_update(), vec!["a"]);
        assert_eq!(*rx2.borrow_and_update(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_update_if_skips_noop() {
        let obs = Observable::new(vec![1, 2, 3]);
        let rx = obs.subscribe();

        assert!(!obs.update_if(|v| {
            let before = v.len();
            v.retain(|x| *x != 9);
            v.len() != before
        }));
        assert!(!rx.has_changed().unwrap());

        assert!(obs.update_if(|v| {
            v.retain(|x| *x != 2);
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(obs.get(), vec![1, 3]);
    }
}
