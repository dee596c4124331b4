//! Caching decorator for set clients.

use super::{AsyncAtomicSet, AsyncNavigableSet, AsyncSetRead, AsyncSetWrite, SetElement, SetEvent};
use crate::cache::ReadCache;
use crate::config::CacheConfig;
use crate::error::PrimitiveResult;
use crate::primitive::PrimitiveState;
use async_trait::async_trait;
use dashmap::DashMap;
use replikit_cluster::{Listener, ListenerKey};
use std::sync::Arc;
use tracing::debug;

/// Caches membership answers of the wrapped client.
///
/// Only `contains` is served from the cache. Navigation and bulk reads
/// always reach the replica. Invalidation follows the multimap decorator:
/// change events and local writes remove the elements they touch, and the
/// cache is dropped whenever the session leaves CONNECTED.
pub struct CachingAsyncSet<E, D> {
    delegate: Arc<D>,
    cache: Arc<ReadCache<E, bool>>,
    invalidator: Listener<SetEvent<E>>,
    state_invalidator: Listener<PrimitiveState>,
    listeners: DashMap<ListenerKey, Listener<SetEvent<E>>>,
}

impl<E, D> CachingAsyncSet<E, D>
where
    E: SetElement,
    D: AsyncAtomicSet<E>,
{
    pub fn new(delegate: Arc<D>, config: &CacheConfig) -> Self {
        let cache = Arc::new(ReadCache::new(delegate.name().to_string(), config));

        let events = cache.clone();
        let invalidator = Listener::new(move |event: SetEvent<E>| events.invalidate(&event.element));
        delegate.add_listener(invalidator.clone());

        let states = cache.clone();
        let state_invalidator = Listener::new(move |state: PrimitiveState| {
            if state != PrimitiveState::Connected {
                debug!(%state, "session left CONNECTED, dropping cached membership");
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
    pub fn cache(&self) -> &ReadCache<E, bool> {
        &self.cache
    }

    /// Invalidate the element a poll removed.
    fn polled(&self, result: PrimitiveResult<Option<E>>) -> PrimitiveResult<Option<E>> {
        if let Ok(Some(element)) = &result {
            self.cache.invalidate(element);
        }
        result
    }
}

#[async_trait]
impl<E, D> AsyncSetRead<E> for CachingAsyncSet<E, D>
where
    E: SetElement,
    D: AsyncAtomicSet<E>,
{
    async fn contains(&self, element: &E) -> PrimitiveResult<bool> {
        if let Some(present) = self.cache.get(element) {
            return Ok(present);
        }
        let token = self.cache.begin_fill();
        let present = self.delegate.contains(element).await?;
        self.cache.fill(element.clone(), present, token);
        Ok(present)
    }

    async fn size(&self) -> PrimitiveResult<u64> {
        self.delegate.size().await
    }

    async fn elements(&self) -> PrimitiveResult<Vec<E>> {
        self.delegate.elements().await
    }
}

#[async_trait]
impl<E, D> AsyncSetWrite<E> for CachingAsyncSet<E, D>
where
    E: SetElement,
    D: AsyncAtomicSet<E>,
{
    async fn add(&self, element: &E) -> PrimitiveResult<bool> {
        self.cache.invalidate(element);
        let result = self.delegate.add(element).await;
        self.cache.invalidate(element);
        result
    }

    async fn add_all(&self, elements: &[E]) -> PrimitiveResult<bool> {
        for element in elements {
            self.cache.invalidate(element);
        }
        let result = self.delegate.add_all(elements).await;
        for element in elements {
            self.cache.invalidate(element);
        }
        result
    }

    async fn remove(&self, element: &E) -> PrimitiveResult<bool> {
        self.cache.invalidate(element);
        let result = self.delegate.remove(element).await;
        self.cache.invalidate(element);
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
impl<E, D> AsyncNavigableSet<E> for CachingAsyncSet<E, D>
where
    E: SetElement,
    D: AsyncAtomicSet<E>,
{
    async fn first(&self) -> PrimitiveResult<Option<E>> {
        self.delegate.first().await
    }

    async fn last(&self) -> PrimitiveResult<Option<E>> {
        self.delegate.last().await
    }

    async fn floor(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.delegate.floor(element).await
    }

    async fn ceiling(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.delegate.ceiling(element).await
    }

    async fn lower(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.delegate.lower(element).await
    }

    async fn higher(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.delegate.higher(element).await
    }

    async fn poll_first(&self) -> PrimitiveResult<Option<E>> {
        let result = self.delegate.poll_first().await;
        self.polled(result)
    }

    async fn poll_last(&self) -> PrimitiveResult<Option<E>> {
        let result = self.delegate.poll_last().await;
        self.polled(result)
    }
}

#[async_trait]
impl<E, D> AsyncAtomicSet<E> for CachingAsyncSet<E, D>
where
    E: SetElement,
    D: AsyncAtomicSet<E>,
{
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn add_listener(&self, listener: Listener<SetEvent<E>>) {
        let cache = self.cache.clone();
        self.listeners.entry(listener.key()).or_insert_with(|| {
            let wrapper = Listener::new(move |event: SetEvent<E>| {
                cache.invalidate(&event.element);
                listener.call(event);
            });
            self.delegate.add_listener(wrapper.clone());
            wrapper
        });
    }

    fn remove_listener(&self, listener: &Listener<SetEvent<E>>) {
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

impl<E, D> std::fmt::Debug for CachingAsyncSet<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingAsyncSet")
            .field("cache", &self.cache)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
