//! Listener registration for live queries and auth-state changes.
//!
//! A backend keeps one [ListenerRegistry] per kind of live result. Registering a listener
//! returns a [Subscription], which unregisters the listener when it is cancelled or dropped.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

/// A callback that receives the full, current result of a live query.
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A set of listeners, each registered for a key such as an owner ID.
pub struct ListenerRegistry<K, T> {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (K, Listener<T>)>>,
}

impl<K, T> Default for ListenerRegistry<K, T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> ListenerRegistry<K, T>
where
    K: PartialEq + Clone + Send + 'static,
    T: Clone + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add `listener` for `key`.
    ///
    /// The listener stays registered until the returned [Subscription] is cancelled or dropped.
    pub fn register(self: &Arc<Self>, key: K, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (key, listener));

        let registry: Weak<Self> = Arc::downgrade(self);

        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        })
    }

    /// Deliver `value` to every listener registered for `key`.
    ///
    /// The listeners are called after the registry lock is released, so a listener may
    /// register or cancel subscriptions itself.
    pub fn notify(&self, key: &K, value: T) {
        for listener in self.listeners_for(key) {
            listener(value.clone());
        }
    }

    /// Whether any listener is registered for `key`.
    pub fn has_listeners(&self, key: &K) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|(listener_key, _)| listener_key == key)
    }

    /// The total number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn listeners_for(&self, key: &K) -> Vec<Listener<T>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(listener_key, _)| listener_key == key)
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    fn unregister(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// A handle to a registered listener.
///
/// Call [Subscription::cancel] to stop receiving updates. Dropping the subscription has the
/// same effect, so a consumer that is torn down never keeps a listener alive.
#[must_use = "dropping a subscription cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription that runs `cancel` exactly once, on cancellation or drop.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister the listener.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
