use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::error;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

/// Zero-argument change callbacks, notified in registration order.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Registry>,
}

/// Returned by [`ListenerRegistry::add`]. Dropping it keeps the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Registry>,
}

impl ListenerHandle {
    /// Deregister. Returns false if it was already gone.
    pub fn remove(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id)
                .is_some(),
            None => false,
        }
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(f));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener; a panicking one is logged and skipped.
    /// Returns how many listeners were invoked.
    pub fn notify_all(&self) -> usize {
        // Run callbacks outside the lock so they may add or remove listeners.
        let listeners: Vec<(u64, Listener)> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in &listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener())) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(listener = id, %reason, "listener failed");
            }
        }
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn notifies_every_listener() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            registry.add(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(registry.notify_all(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = hits.clone();
        registry.add(move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
        registry.add(|| panic!("widget exploded"));
        let last = hits.clone();
        registry.add(move || {
            last.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.notify_all(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = registry.add(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.remove());
        assert_eq!(registry.notify_all(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_may_register_another_during_notify() {
        let registry = ListenerRegistry::new();
        let inner = registry.clone();
        registry.add(move || {
            inner.add(|| {});
        });
        assert_eq!(registry.notify_all(), 1);
        assert_eq!(registry.len(), 2);
    }
}
