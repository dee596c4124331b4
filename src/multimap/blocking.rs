//! Blocking multimap facade.

use super::{AsyncAtomicMultimap, MultimapEvent};
use crate::blocking::Blocking;
use crate::error::PrimitiveResult;
use crate::primitive::{PrimitiveState, PrimitiveValue, Versioned};
use replikit_cluster::Listener;
use std::sync::Arc;

/// Synchronous multimap client. Every call blocks the calling thread for at
/// most the configured timeout.
///
/// Must not be used from inside an async runtime; calls made there fail with
/// [`crate::error::PrimitiveError::BlockingOnRuntime`]. That includes
/// closures run through `tokio::task::spawn_blocking`; call from a
/// [`std::thread`] instead.
pub struct BlockingAtomicMultimap<K: PrimitiveValue, V: PrimitiveValue> {
    delegate: Arc<dyn AsyncAtomicMultimap<K, V>>,
    blocking: Blocking,
}

impl<K: PrimitiveValue, V: PrimitiveValue> BlockingAtomicMultimap<K, V> {
    pub fn new(delegate: Arc<dyn AsyncAtomicMultimap<K, V>>, blocking: Blocking) -> Self {
        Self { delegate, blocking }
    }

    /// The asynchronous client behind this facade.
    #[must_use]
    pub fn async_multimap(&self) -> &Arc<dyn AsyncAtomicMultimap<K, V>> {
        &self.delegate
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    pub fn get(&self, key: K) -> PrimitiveResult<Versioned<Vec<V>>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.get(&key).await })
    }

    pub fn contains_key(&self, key: K) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.contains_key(&key).await })
    }

    pub fn size(&self) -> PrimitiveResult<u64> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.size().await })
    }

    pub fn put(&self, key: K, value: V) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.put(&key, &value).await })
    }

    pub fn put_all(&self, key: K, values: Vec<V>) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.put_all(&key, &values).await })
    }

    pub fn remove(&self, key: K, value: V) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.remove(&key, &value).await })
    }

    pub fn remove_all(&self, key: K) -> PrimitiveResult<Versioned<Vec<V>>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.remove_all(&key).await })
    }

    pub fn clear(&self) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.clear().await })
    }

    pub fn add_listener(&self, listener: Listener<MultimapEvent<K, V>>) {
        self.delegate.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Listener<MultimapEvent<K, V>>) {
        self.delegate.remove_listener(listener);
    }

    pub fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.delegate.add_state_change_listener(listener);
    }

    pub fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.delegate.remove_state_change_listener(listener);
    }

    pub fn close(&self) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.close().await })
    }
}

impl<K: PrimitiveValue, V: PrimitiveValue> std::fmt::Debug for BlockingAtomicMultimap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingAtomicMultimap")
            .field("timeout", &self.blocking.timeout())
            .finish()
    }
}
