//! An in-memory copy of a live query result.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{
    Error,
    backend::{Listener, Subscription},
};

/// Holds the latest result delivered by a live subscription.
///
/// Each delivery replaces the whole list, so readers always see a complete snapshot. The
/// subscription is released by [LiveCollection::unmount] or when the collection is dropped.
#[derive(Debug)]
pub struct LiveCollection<T> {
    items: Arc<RwLock<Vec<T>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl<T> LiveCollection<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start a live query with `watch`, passing it a listener that stores each delivery.
    ///
    /// # Errors
    /// Returns the error from `watch` if the subscription could not be created.
    pub fn subscribe(
        watch: impl FnOnce(Listener<Vec<T>>) -> Result<Subscription, Error>,
    ) -> Result<Self, Error> {
        let items = Arc::new(RwLock::new(Vec::new()));
        let sink = items.clone();
        let listener: Listener<Vec<T>> = Arc::new(move |snapshot: Vec<T>| {
            *sink.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        });

        let subscription = watch(listener)?;

        Ok(Self {
            items,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// A copy of the latest delivered result.
    pub fn snapshot(&self) -> Vec<T> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `f` over the latest delivered result without copying it.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Cancel the subscription. The last delivered result stays readable.
    pub fn unmount(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    /// Whether the subscription is still active.
    pub fn is_mounted(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod live_collection_tests {
    use crate::backend::ListenerRegistry;

    use super::LiveCollection;

    #[test]
    fn keeps_latest_delivery() {
        let registry = ListenerRegistry::<u8, Vec<&'static str>>::new();
        let collection =
            LiveCollection::subscribe(|listener| Ok(registry.register(1, listener))).unwrap();

        registry.notify(&1, vec!["a", "b"]);
        registry.notify(&1, vec!["c"]);

        assert_eq!(collection.snapshot(), vec!["c"]);
        assert_eq!(collection.with(|items| items.len()), 1);
    }

    #[test]
    fn unmount_stops_updates_and_releases_listener() {
        let registry = ListenerRegistry::<u8, Vec<&'static str>>::new();
        let collection =
            LiveCollection::subscribe(|listener| Ok(registry.register(1, listener))).unwrap();
        registry.notify(&1, vec!["a"]);

        collection.unmount();
        registry.notify(&1, vec!["b"]);

        assert!(!collection.is_mounted());
        assert_eq!(collection.snapshot(), vec!["a"]);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn dropping_collection_releases_listener() {
        let registry = ListenerRegistry::<u8, Vec<&'static str>>::new();
        let collection =
            LiveCollection::subscribe(|listener| Ok(registry.register(1, listener))).unwrap();

        drop(collection);

        assert_eq!(registry.len(), 0);
    }
}
