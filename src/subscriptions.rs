//! Change-notification subscriptions.
//!
//! Consumers learn that the user configuration was reloaded either through a
//! synchronous callback ([`SubscriptionManager::subscribe`]) or through a
//! `tokio::sync::watch` receiver carrying the store generation. Both are
//! level-triggered: a notification only says "re-read the configuration", it
//! never describes what changed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Handle returned by [`SubscriptionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Payload passed to callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChanged {
    /// Store generation right after the reload.
    pub generation: u64,
}

pub type ChangeCallback = Arc<dyn Fn(ConfigChanged) + Send + Sync>;

/// Registry of change subscribers.
///
/// Thread-safe: callbacks are stored behind an internal `Mutex`, but are
/// invoked after the lock is released so a callback may subscribe or
/// unsubscribe without deadlocking.
pub struct SubscriptionManager {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, ChangeCallback)>>,
    generation_tx: watch::Sender<u64>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
            generation_tx,
        }
    }

    /// Register a callback. Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConfigChanged) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.lock().is_empty()
    }

    /// A receiver that observes the generation of the latest notification.
    pub fn receiver(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Deliver one notification to every subscriber.
    ///
    /// Callbacks run first; receivers are woken once every callback returned.
    pub fn notify(&self, generation: u64) {
        let callbacks: Vec<ChangeCallback> =
            self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        let event = ConfigChanged { generation };
        for callback in callbacks {
            callback(event);
        }
        self.generation_tx.send_replace(generation);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, ChangeCallback)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscribers", &self.lock().len())
            .field("generation", &*self.generation_tx.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_unsubscribe() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.has_subscriptions());

        let id = mgr.subscribe(|_| {});
        assert!(mgr.has_subscriptions());

        assert!(mgr.unsubscribe(id));
        assert!(!mgr.has_subscriptions());

        // Unsubscribe missing returns false
        assert!(!mgr.unsubscribe(id));
    }

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let mgr = SubscriptionManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            mgr.subscribe(move |event| {
                assert_eq!(event.generation, 7);
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        mgr.notify(7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribed_callback_not_called() {
        let mgr = SubscriptionManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = mgr.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        mgr.unsubscribe(id);

        mgr.notify(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_receiver_sees_latest_generation() {
        let mgr = SubscriptionManager::new();
        let mut rx = mgr.receiver();
        assert!(!rx.has_changed().unwrap());

        mgr.notify(3);
        mgr.notify(4);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 4);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let mgr = Arc::new(SubscriptionManager::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let mgr_ref = Arc::clone(&mgr);
        let slot_ref = Arc::clone(&slot);
        let id = mgr.subscribe(move |_| {
            if let Some(id) = *slot_ref.lock().unwrap() {
                mgr_ref.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        mgr.notify(1);
        assert!(!mgr.has_subscriptions());
    }
}
