//! Session-backed set client.

use super::{
    AsyncAtomicSet, AsyncNavigableSet, AsyncSetRead, AsyncSetWrite, CHANGE_EVENT, SetChange, SetElement, SetEntry,
    SetEvent, ops,
};
use crate::error::PrimitiveResult;
use crate::primitive::{EventType, PrimitiveEvent, PrimitiveProxy, PrimitiveState};
use async_trait::async_trait;
use dashmap::DashMap;
use replikit_cluster::{Listener, ListenerKey, Serializer, SerializerError};
use std::marker::PhantomData;
use tracing::warn;

/// Set client that encodes elements with their sort keys.
pub struct SetProxy<E> {
    proxy: PrimitiveProxy,
    listeners: DashMap<ListenerKey, Listener<PrimitiveEvent>>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: SetElement> SetProxy<E> {
    pub fn new(proxy: PrimitiveProxy) -> Self {
        Self {
            proxy,
            listeners: DashMap::new(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn proxy(&self) -> &PrimitiveProxy {
        &self.proxy
    }

    fn serializer(&self) -> &Serializer {
        self.proxy.serializer()
    }

    fn entry(&self, element: &E) -> Result<SetEntry, SerializerError> {
        Ok(SetEntry {
            key: element.sort_key(),
            value: self.serializer().encode(element)?.to_vec(),
        })
    }

    fn decode_element(&self, encoded: Option<Vec<u8>>) -> PrimitiveResult<Option<E>> {
        Ok(encoded
            .map(|value| self.serializer().decode::<E>(&value))
            .transpose()?)
    }

    async fn navigate(&self, operation: &str, element: &E) -> PrimitiveResult<Option<E>> {
        let found: Option<Vec<u8>> = self.proxy.invoke(operation, &element.sort_key()).await?;
        self.decode_element(found)
    }

    async fn end(&self, operation: &str) -> PrimitiveResult<Option<E>> {
        let found: Option<Vec<u8>> = self.proxy.invoke_empty(operation).await?;
        self.decode_element(found)
    }
}

fn decode_event<E: SetElement>(serializer: &Serializer, event: &PrimitiveEvent) -> Result<SetEvent<E>, SerializerError> {
    let change: SetChange = serializer.decode(event.payload())?;
    Ok(SetEvent {
        kind: change.kind,
        element: serializer.decode(&change.value)?,
    })
}

#[async_trait]
impl<E: SetElement> AsyncSetRead<E> for SetProxy<E> {
    async fn contains(&self, element: &E) -> PrimitiveResult<bool> {
        self.proxy.invoke(ops::CONTAINS, &element.sort_key()).await
    }

    async fn size(&self) -> PrimitiveResult<u64> {
        self.proxy.invoke_empty(ops::SIZE).await
    }

    async fn elements(&self) -> PrimitiveResult<Vec<E>> {
        let encoded: Vec<Vec<u8>> = self.proxy.invoke_empty(ops::ELEMENTS).await?;
        Ok(encoded
            .iter()
            .map(|value| self.serializer().decode::<E>(value))
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl<E: SetElement> AsyncSetWrite<E> for SetProxy<E> {
    async fn add(&self, element: &E) -> PrimitiveResult<bool> {
        let entry = self.entry(element)?;
        self.proxy.invoke(ops::ADD, &entry).await
    }

    async fn add_all(&self, elements: &[E]) -> PrimitiveResult<bool> {
        let entries = elements
            .iter()
            .map(|element| self.entry(element))
            .collect::<Result<Vec<_>, _>>()?;
        self.proxy.invoke(ops::ADD_ALL, &entries).await
    }

    async fn remove(&self, element: &E) -> PrimitiveResult<bool> {
        self.proxy.invoke(ops::REMOVE, &element.sort_key()).await
    }

    async fn clear(&self) -> PrimitiveResult<()> {
        self.proxy.invoke_empty(ops::CLEAR).await
    }
}

#[async_trait]
impl<E: SetElement> AsyncNavigableSet<E> for SetProxy<E> {
    async fn first(&self) -> PrimitiveResult<Option<E>> {
        self.end(ops::FIRST).await
    }

    async fn last(&self) -> PrimitiveResult<Option<E>> {
        self.end(ops::LAST).await
    }

    async fn floor(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.navigate(ops::FLOOR, element).await
    }

    async fn ceiling(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.navigate(ops::CEILING, element).await
    }

    async fn lower(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.navigate(ops::LOWER, element).await
    }

    async fn higher(&self, element: &E) -> PrimitiveResult<Option<E>> {
        self.navigate(ops::HIGHER, element).await
    }

    async fn poll_first(&self) -> PrimitiveResult<Option<E>> {
        self.end(ops::POLL_FIRST).await
    }

    async fn poll_last(&self) -> PrimitiveResult<Option<E>> {
        self.end(ops::POLL_LAST).await
    }
}

#[async_trait]
impl<E: SetElement> AsyncAtomicSet<E> for SetProxy<E> {
    fn name(&self) -> &str {
        self.proxy.name()
    }

    fn add_listener(&self, listener: Listener<SetEvent<E>>) {
        let serializer = self.serializer().clone();
        self.listeners.entry(listener.key()).or_insert_with(|| {
            let wrapper = Listener::new(move |event: PrimitiveEvent| match decode_event::<E>(&serializer, &event) {
                Ok(decoded) => listener.call(decoded),
                Err(err) => warn!(error = %err, "dropping undecodable set event"),
            });
            self.proxy
                .client()
                .add_event_listener(EventType::new(CHANGE_EVENT), wrapper.clone());
            wrapper
        });
    }

    fn remove_listener(&self, listener: &Listener<SetEvent<E>>) {
        if let Some((_, wrapper)) = self.listeners.remove(&listener.key()) {
            self.proxy
                .client()
                .remove_event_listener(&EventType::new(CHANGE_EVENT), &wrapper);
        }
    }

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.proxy.add_state_change_listener(listener);
    }

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.proxy.remove_state_change_listener(listener);
    }

    async fn close(&self) -> PrimitiveResult<()> {
        self.proxy.close().await
    }
}

impl<E> std::fmt::Debug for SetProxy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetProxy")
            .field("proxy", &self.proxy)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
