//! Observer registry used for auth-state, token-refresh, and connection
//! events.
//!
//! Listeners are keyed by monotonically increasing handles, so removal
//! always drops exactly the subscription it was issued for, and
//! notification runs in registration order. A listener that panics is
//! contained and logged; it never prevents the remaining listeners from
//! running.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Listeners<T> = Arc<Mutex<BTreeMap<u64, Callback<T>>>>;

/// Registry of event listeners for values of type `T`.
///
/// Cloning shares the underlying listener set.
pub struct ListenerRegistry<T> {
    listeners: Listeners<T>,
    next_handle: Arc<AtomicU64>,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_handle: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers a listener and returns its [`Subscription`] handle.
    ///
    /// The listener stays registered until the handle is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .insert(handle, Arc::new(listener));

        let listeners: Weak<Mutex<BTreeMap<u64, Callback<T>>>> = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.lock().unwrap().remove(&handle);
                }
            })),
        }
    }

    /// Notifies all listeners in registration order.
    pub fn notify(&self, value: &T) {
        // Snapshot outside the lock so a listener can subscribe/unsubscribe
        // without deadlocking.
        let snapshot: Vec<Callback<T>> = self.listeners.lock().unwrap().values().cloned().collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                log::error!("listener panicked during notification");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            next_handle: Arc::clone(&self.next_handle),
        }
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered listener.
///
/// Unsubscribes on drop; call [`Subscription::unsubscribe`] to remove the
/// listener explicitly.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifies_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _subs: Vec<Subscription> = (0..4)
            .map(|i| {
                let seen = Arc::clone(&seen);
                registry.subscribe(move |_: &u32| seen.lock().unwrap().push(i))
            })
            .collect();

        registry.notify(&7);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn unsubscribe_removes_exactly_one_listener() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicU64::new(0));

        let make = |registry: &ListenerRegistry<u32>| {
            let count = Arc::clone(&count);
            registry.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let first = make(&registry);
        let _second = make(&registry);

        first.unsubscribe();
        assert_eq!(registry.len(), 1);

        registry.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let registry = ListenerRegistry::new();
        {
            let _sub = registry.subscribe(|_: &u32| {});
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let registry = ListenerRegistry::new();
        let reached = Arc::new(AtomicU64::new(0));

        let _bad = registry.subscribe(|_: &u32| panic!("listener failure"));
        let reached_clone = Arc::clone(&reached);
        let _good = registry.subscribe(move |_| {
            reached_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }
}
