//! Listener identity and concurrent listener tables.
//!
//! Closures have no identity of their own, so a [`Listener`] is a shared
//! callback whose identity is its allocation. Clones of one listener compare
//! equal through [`Listener::key`], which is what removal is keyed on.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(usize);

/// A shared callback with stable identity.
pub struct Listener<T> {
    callback: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> Listener<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Identity shared by every clone of this listener.
    #[must_use]
    pub fn key(&self) -> ListenerKey {
        ListenerKey(Arc::as_ptr(&self.callback) as *const () as usize)
    }

    pub fn call(&self, value: T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.key()).finish()
    }
}

/// Listener table safe for registration and removal during dispatch.
///
/// Dispatch iterates a snapshot, so a listener removed mid-dispatch may still
/// observe the value being delivered, but the table itself is never corrupted.
pub struct ListenerSet<T> {
    listeners: DashMap<ListenerKey, Listener<T>>,
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    pub fn add(&self, listener: Listener<T>) -> ListenerKey {
        let key = listener.key();
        self.listeners.insert(key, listener);
        key
    }

    /// Remove a listener. Returns `None` if it was never registered.
    pub fn remove(&self, key: &ListenerKey) -> Option<Listener<T>> {
        self.listeners.remove(key).map(|(_, listener)| listener)
    }

    pub fn contains(&self, key: &ListenerKey) -> bool {
        self.listeners.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Listener<T>> {
        self.listeners.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn clear(&self) {
        self.listeners.clear();
    }
}

impl<T: Clone> ListenerSet<T> {
    /// Deliver a value to every registered listener.
    pub fn notify(&self, value: &T) {
        for listener in self.snapshot() {
            listener.call(value.clone());
        }
    }
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}
