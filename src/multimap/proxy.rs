//! Session-backed multimap client.

use super::{
    AsyncAtomicMultimap, AsyncMultimapRead, AsyncMultimapWrite, CHANGE_EVENT, EncodedValues, MultimapBatch,
    MultimapChange, MultimapEntry, MultimapEvent, ops,
};
use crate::error::PrimitiveResult;
use crate::primitive::{EventType, PrimitiveEvent, PrimitiveProxy, PrimitiveState, PrimitiveValue, Versioned};
use async_trait::async_trait;
use dashmap::DashMap;
use replikit_cluster::{Listener, ListenerKey, Serializer, SerializerError};
use std::marker::PhantomData;
use tracing::warn;

/// Multimap client that encodes keys and values and talks to the session.
pub struct MultimapProxy<K, V> {
    proxy: PrimitiveProxy,
    listeners: DashMap<ListenerKey, Listener<PrimitiveEvent>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: PrimitiveValue, V: PrimitiveValue> MultimapProxy<K, V> {
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

    fn encode_key(&self, key: &K) -> Result<Vec<u8>, SerializerError> {
        Ok(self.serializer().encode(key)?.to_vec())
    }

    fn entry(&self, key: &K, value: &V) -> Result<MultimapEntry, SerializerError> {
        Ok(MultimapEntry {
            key: self.encode_key(key)?,
            value: self.serializer().encode(value)?.to_vec(),
        })
    }

    fn decode_values(&self, encoded: EncodedValues) -> PrimitiveResult<Versioned<Vec<V>>> {
        let values = encoded
            .value
            .iter()
            .map(|value| self.serializer().decode::<V>(value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Versioned::new(values, encoded.version, encoded.creation_time))
    }
}

fn decode_event<K: PrimitiveValue, V: PrimitiveValue>(
    serializer: &Serializer,
    event: &PrimitiveEvent,
) -> Result<MultimapEvent<K, V>, SerializerError> {
    let change: MultimapChange = serializer.decode(event.payload())?;
    Ok(MultimapEvent {
        kind: change.kind,
        key: serializer.decode(&change.key)?,
        value: serializer.decode(&change.value)?,
    })
}

#[async_trait]
impl<K: PrimitiveValue, V: PrimitiveValue> AsyncMultimapRead<K, V> for MultimapProxy<K, V> {
    async fn get(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>> {
        let key = self.encode_key(key)?;
        let encoded: EncodedValues = self.proxy.invoke(ops::GET, &key).await?;
        self.decode_values(encoded)
    }

    async fn contains_key(&self, key: &K) -> PrimitiveResult<bool> {
        let key = self.encode_key(key)?;
        self.proxy.invoke(ops::CONTAINS_KEY, &key).await
    }

    async fn size(&self) -> PrimitiveResult<u64> {
        self.proxy.invoke_empty(ops::SIZE).await
    }
}

#[async_trait]
impl<K: PrimitiveValue, V: PrimitiveValue> AsyncMultimapWrite<K, V> for MultimapProxy<K, V> {
    async fn put(&self, key: &K, value: &V) -> PrimitiveResult<bool> {
        let entry = self.entry(key, value)?;
        self.proxy.invoke(ops::PUT, &entry).await
    }

    async fn put_all(&self, key: &K, values: &[V]) -> PrimitiveResult<bool> {
        let batch = MultimapBatch {
            key: self.encode_key(key)?,
            values: values
                .iter()
                .map(|value| self.serializer().encode(value).map(|bytes| bytes.to_vec()))
                .collect::<Result<_, _>>()?,
        };
        self.proxy.invoke(ops::PUT_ALL, &batch).await
    }

    async fn remove(&self, key: &K, value: &V) -> PrimitiveResult<bool> {
        let entry = self.entry(key, value)?;
        self.proxy.invoke(ops::REMOVE, &entry).await
    }

    async fn remove_all(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>> {
        let key = self.encode_key(key)?;
        let encoded: EncodedValues = self.proxy.invoke(ops::REMOVE_ALL, &key).await?;
        self.decode_values(encoded)
    }

    async fn clear(&self) -> PrimitiveResult<()> {
        self.proxy.invoke_empty(ops::CLEAR).await
    }
}

#[async_trait]
impl<K: PrimitiveValue, V: PrimitiveValue> AsyncAtomicMultimap<K, V> for MultimapProxy<K, V> {
    fn name(&self) -> &str {
        self.proxy.name()
    }

    fn add_listener(&self, listener: Listener<MultimapEvent<K, V>>) {
        let serializer = self.serializer().clone();
        self.listeners.entry(listener.key()).or_insert_with(|| {
            let wrapper = Listener::new(move |event: PrimitiveEvent| {
                match decode_event::<K, V>(&serializer, &event) {
                    Ok(decoded) => listener.call(decoded),
                    Err(err) => warn!(error = %err, "dropping undecodable multimap event"),
                }
            });
            self.proxy
                .client()
                .add_event_listener(EventType::new(CHANGE_EVENT), wrapper.clone());
            wrapper
        });
    }

    fn remove_listener(&self, listener: &Listener<MultimapEvent<K, V>>) {
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

impl<K, V> std::fmt::Debug for MultimapProxy<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultimapProxy")
            .field("proxy", &self.proxy)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
