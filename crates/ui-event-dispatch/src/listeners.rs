//! Ordered listener fan-out with UI-thread-marshaled delivery.

use crate::dispatcher::{panic_message, UiDispatcher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct RegistryInner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Fan-out of change notifications to registered callbacks.
///
/// Callbacks run in registration order, on the UI work queue, regardless of
/// which task triggered the notification. A callback that panics is caught
/// and logged; it never prevents later callbacks in the same pass, nor
/// future notify calls.
pub struct ListenerRegistry<T> {
    inner: Arc<RegistryInner<T>>,
    dispatcher: UiDispatcher,
}

impl<T: Send + 'static> ListenerRegistry<T> {
    pub fn new(dispatcher: UiDispatcher) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
            dispatcher,
        }
    }

    /// Register a callback. The returned handle deregisters it; dropping the
    /// handle without calling [`ListenerHandle::remove`] leaves the callback
    /// registered for the registry's lifetime.
    pub fn register(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerHandle<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .expect("lock poisoned")
            .push((id, Arc::new(callback)));
        ListenerHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `payload` to every registered callback via the UI work queue.
    ///
    /// The callback snapshot is taken when the UI loop executes the pass, so
    /// a listener deregistered in the meantime is not invoked.
    pub fn notify(&self, payload: T) {
        let inner = self.inner.clone();
        self.dispatcher.post(move || {
            let snapshot: Vec<(u64, Listener<T>)> =
                inner.listeners.lock().expect("lock poisoned").clone();
            for (id, callback) in snapshot {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&payload))) {
                    error!(
                        listener_id = id,
                        panic = %panic_message(panic.as_ref()),
                        "Listener callback panicked"
                    );
                }
            }
        });
    }

    /// Number of currently registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.listeners.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry").finish_non_exhaustive()
    }
}

/// Deregistration handle for one listener.
pub struct ListenerHandle<T> {
    id: u64,
    inner: Weak<RegistryInner<T>>,
}

impl<T> ListenerHandle<T> {
    /// Remove the listener from its registry. Idempotent; a no-op when the
    /// registry has already been dropped.
    pub fn remove(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .lock()
                .expect("lock poisoned")
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl<T> std::fmt::Debug for ListenerHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
