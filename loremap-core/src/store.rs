//! Observable state container.
//!
//! A [`Store`] owns exactly one immutable snapshot (`Arc<T>`) plus an ordered
//! list of subscribers. Updates replace the snapshot wholesale; subscribers are
//! notified synchronously, but only when the updater hands back a different
//! allocation than the one it was given. Returning the same `Arc` is the
//! "nothing changed" signal and is never broadcast.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Callback invoked with the new snapshot after every accepted update.
pub type Listener<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

struct Inner<T> {
    state: RwLock<Arc<T>>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Shared, cloneable handle to an observable snapshot.
///
/// Clones refer to the same underlying state and subscriber list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use loremap_core::store::Store;
///
/// let store = Store::new(1_u32);
/// let sub = store.subscribe(|n| println!("now {n}"));
///
/// store.update(|n| Arc::new(**n + 1)); // notifies
/// store.update(Arc::clone);            // same reference, silent
/// assert_eq!(*store.get_state(), 2);
///
/// sub.unsubscribe();
/// ```
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl<T> Store<T> {
    /// Create a store holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Arc::new(initial)),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    #[must_use]
    pub fn get_state(&self) -> Arc<T> {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state)
    }

    /// Register a listener. Listeners run in subscription order.
    ///
    /// The returned handle removes the listener when
    /// [`Subscription::unsubscribe`] is called; dropping it leaves the
    /// listener registered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<T>
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Replace the snapshot with `updater(current)`.
    ///
    /// If the updater returns the very same `Arc` it was given, the call is a
    /// no-op and nobody is notified. Otherwise the new snapshot is installed
    /// and every listener registered at that moment is invoked before this
    /// method returns.
    ///
    /// The updater runs while the store is locked and must not call back into
    /// the same store.
    ///
    /// Returns `true` when the snapshot changed.
    pub fn update<F>(&self, updater: F) -> bool
    where
        F: FnOnce(&Arc<T>) -> Arc<T>,
    {
        let next = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let next = updater(&state);
            if Arc::ptr_eq(&next, &state) {
                return false;
            }
            *state = Arc::clone(&next);
            next
        };
        self.notify(&next);
        true
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Non-owning handle, for listeners that need to reach back into the store
    /// without keeping it alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn notify(&self, state: &Arc<T>) {
        // Snapshot first: listeners may subscribe or unsubscribe while we iterate.
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

impl<T: Clone> Store<T> {
    /// Copy the current snapshot, let `edit` modify the copy, install it.
    ///
    /// Always produces a new snapshot and therefore always notifies.
    pub fn patch<F>(&self, edit: F)
    where
        F: FnOnce(&mut T),
    {
        self.update(|current| {
            let mut next = T::clone(current);
            edit(&mut next);
            Arc::new(next)
        });
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug)]
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    /// Remove the listener. A no-op if the store is already gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Weak counterpart of [`Store`].
pub struct WeakStore<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakStore<T> {
    /// Upgrade to a strong handle if the store is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Store<T>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}
