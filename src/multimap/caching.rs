//! Read-through caching decorator for multimap clients.

use super::{AsyncAtomicMultimap, AsyncMultimapRead, AsyncMultimapWrite, MultimapEvent};
use crate::cache::ReadCache;
use crate::config::CacheConfig;
use crate::error::PrimitiveResult;
use crate::primitive::{PrimitiveState, PrimitiveValue, Versioned};
use async_trait::async_trait;
use dashmap::DashMap;
use replikit_cluster::{Listener, ListenerKey};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Caches `get` results of the wrapped client.
///
/// A change event removes its key from the cache before any user listener
/// sees the event. Local writes invalidate the keys they touch, and the
/// whole cache is dropped whenever the session leaves CONNECTED.
pub struct CachingAsyncMultimap<K, V, D> {
    delegate: Arc<D>,
    cache: Arc<ReadCache<K, Versioned<Vec<V>>>>,
    invalidator: Listener<MultimapEvent<K, V>>,
    state_invalidator: Listener<PrimitiveState>,
    listeners: DashMap<ListenerKey, Listener<MultimapEvent<K, V>>>,
}

impl<K, V, D> CachingAsyncMultimap<K, V, D>
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
    D: AsyncAtomicMultimap<K, V>,
{
    pub fn new(delegate: Arc<D>, config: &CacheConfig) -> Self {
        let cache = Arc::new(ReadCache::new(delegate.name().to_string(), config));

        let events = cache.clone();
        let invalidator = Listener::new(move |event: MultimapEvent<K, V>| events.invalidate(&event.key));
        delegate.add_listener(invalidator.clone());

        let states = cache.clone();
        let state_invalidator = Listener::new(move |state: PrimitiveState| {
            if state != PrimitiveState::Connected {
                debug!(%state, "session left CONNECTED, dropping cached reads");
                states.invalidate_all();
            }
        });
        delegate.add_state_change_listener(state_invalidator.clone());

        Self {
            delegate,
            cache,
            invalidator,
            state_invalidator,
            listeners: DashMap::new(),
        }
    }

    #[must_use]
    pub fn delegate(&self) -> &Arc<D> {
        &self.delegate
    }

    #[must_use]
    pub fn cache(&self) -> &ReadCache<K, Versioned<Vec<V>>> {
        &self.cache
    }
}

#[async_trait]
impl<K, V, D> AsyncMultimapRead<K, V> for CachingAsyncMultimap<K, V, D>
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
    D: AsyncAtomicMultimap<K, V>,
{
    async fn get(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>> {
        if let Some(values) = self.cache.get(key) {
            return Ok(values);
        }
        let token = self.cache.begin_fill();
        let values = self.delegate.get(key).await?;
        self.cache.fill(key.clone(), values.clone(), token);
        Ok(values)
    }

    async fn contains_key(&self, key: &K) -> PrimitiveResult<bool> {
        self.delegate.contains_key(key).await
    }

    async fn size(&self) -> PrimitiveResult<u64> {
        self.delegate.size().await
    }
}

#[async_trait]
impl<K, V, D> AsyncMultimapWrite<K, V> for CachingAsyncMultimap<K, V, D>
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
    D: AsyncAtomicMultimap<K, V>,
{
    async fn put(&self, key: &K, value: &V) -> PrimitiveResult<bool> {
        self.cache.invalidate(key);
        let result = self.delegate.put(key, value).await;
        self.cache.invalidate(key);
        result
    }

    async fn put_all(&self, key: &K, values: &[V]) -> PrimitiveResult<bool> {
        self.cache.invalidate(key);
        let result = self.delegate.put_all(key, values).await;
        self.cache.invalidate(key);
        result
    }

    async fn remove(&self, key: &K, value: &V) -> PrimitiveResult<bool> {
        self.cache.invalidate(key);
        let result = self.delegate.remove(key, value).await;
        self.cache.invalidate(key);
        result
    }

    async fn remove_all(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>> {
        self.cache.invalidate(key);
        let result = self.delegate.remove_all(key).await;
        self.cache.invalidate(key);
        result
    }

    async fn clear(&self) -> PrimitiveResult<()> {
        self.cache.invalidate_all();
        let result = self.delegate.clear().await;
        self.cache.invalidate_all();
        result
    }
}

#[async_trait]
impl<K, V, D> AsyncAtomicMultimap<K, V> for CachingAsyncMultimap<K, V, D>
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
    D: AsyncAtomicMultimap<K, V>,
{
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn add_listener(&self, listener: Listener<MultimapEvent<K, V>>) {
        let cache = self.cache.clone();
        self.listeners.entry(listener.key()).or_insert_with(|| {
            let wrapper = Listener::new(move |event: MultimapEvent<K, V>| {
                cache.invalidate(&event.key);
                listener.call(event);
            });
            self.delegate.add_listener(wrapper.clone());
            wrapper
        });
    }

    fn remove_listener(&self, listener: &Listener<MultimapEvent<K, V>>) {
        if let Some((_, wrapper)) = self.listeners.remove(&listener.key()) {
            self.delegate.remove_listener(&wrapper);
        }
    }

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.delegate.add_state_change_listener(listener);
    }

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.delegate.remove_state_change_listener(listener);
    }

    async fn close(&self) -> PrimitiveResult<()> {
        self.delegate.remove_listener(&self.invalidator);
        self.delegate.remove_state_change_listener(&self.state_invalidator);
        self.cache.invalidate_all();
        self.delegate.close().await
    }
}

impl<K, V, D> std::fmt::Debug for CachingAsyncMultimap<K, V, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingAsyncMultimap")
            .field("cache", &self.cache)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
