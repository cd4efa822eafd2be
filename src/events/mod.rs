//! Publish/subscribe registry shared by the state store, the ledger and the facade.
//!
//! # Design Decisions
//! - Delivery is synchronous and in subscription order
//! - A panicking listener is logged and skipped; later listeners still run
//! - Dropping a [`Subscription`] keeps the listener registered; call `unsubscribe`

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use crate::observability::metrics;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Callback<T>)>,
}

/// A list of listeners for values of type `T`.
pub struct Subscribers<T> {
    topic: &'static str,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Subscribers<T> {
    /// Create an empty registry. `topic` labels logs and metrics.
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Deliver `value` to every listener.
    pub fn notify(&self, value: &T) {
        // Snapshot so listeners may (un)subscribe while being notified.
        let listeners: Vec<Callback<T>> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in listeners {
            self.deliver_one(&*callback, value);
        }
    }

    /// Deliver `value` to a single listener, isolating a panic the same way
    /// `notify` does.
    pub fn deliver_one(&self, callback: &dyn Fn(&T), value: &T) {
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            tracing::error!(topic = self.topic, "Subscriber panicked; continuing delivery");
            metrics::record_subscriber_panic(self.topic);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        // A poisoned registry still holds a consistent listener list.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by `subscribe`.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
