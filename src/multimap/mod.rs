//! Atomic multimap primitive.
//!
//! A replicated map from keys to sets of values. Every key carries the
//! commit index that last changed it, and every change is published as a
//! `change` event so caching clients can invalidate.
//!
//! Clients are layered from small capability traits:
//!
//! ```text
//! BlockingAtomicMultimap ──▶ CachingAsyncMultimap ──▶ MultimapProxy ──▶ session
//!        (sync facade)          (read cache)            (encoding)
//! ```

mod blocking;
mod builder;
mod caching;
mod proxy;
mod service;

pub use blocking::BlockingAtomicMultimap;
pub use builder::{AtomicMultimapBuilder, AtomicMultimapConfig};
pub use caching::CachingAsyncMultimap;
pub use proxy::MultimapProxy;
pub use service::AtomicMultimapService;

use crate::error::PrimitiveResult;
use crate::primitive::{
    PrimitiveBuilderFactory, PrimitiveManagementService, PrimitiveState, PrimitiveType, PrimitiveValue,
    ReplicatedService, ServiceConfig, Versioned,
};
use async_trait::async_trait;
use replikit_cluster::{Listener, Namespace};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

/// Registry name of the atomic multimap type.
pub const TYPE_NAME: &str = "atomic-multimap";

/// Event type of change notifications.
pub const CHANGE_EVENT: &str = "change";

/// Operation names understood by [`AtomicMultimapService`].
pub mod ops {
    pub const PUT: &str = "put";
    pub const PUT_ALL: &str = "put_all";
    pub const GET: &str = "get";
    pub const REMOVE: &str = "remove";
    pub const REMOVE_ALL: &str = "remove_all";
    pub const CONTAINS_KEY: &str = "contains_key";
    pub const SIZE: &str = "size";
    pub const CLEAR: &str = "clear";
}

// ============================================================================
// Wire types
// ============================================================================

/// Keys and values cross the wire already encoded by the client serializer.
pub type EncodedValues = Versioned<Vec<Vec<u8>>>;

/// One key/value pair (`put`, `remove`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimapEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A key with several values (`put_all`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimapBatch {
    pub key: Vec<u8>,
    pub values: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Remove,
}

/// Payload of a `change` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimapChange {
    pub kind: ChangeKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Service state captured by a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimapSnapshot {
    pub entries: Vec<(Vec<u8>, EncodedValues)>,
}

/// A decoded change event delivered to multimap listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultimapEvent<K, V> {
    pub kind: ChangeKind,
    pub key: K,
    pub value: V,
}

// ============================================================================
// Capability traits
// ============================================================================

#[async_trait]
pub trait AsyncMultimapRead<K: PrimitiveValue, V: PrimitiveValue>: Send + Sync {
    /// Values of `key` with the version that last changed them. An absent
    /// key yields an empty list at version 0.
    async fn get(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>>;

    async fn contains_key(&self, key: &K) -> PrimitiveResult<bool>;

    /// Number of key/value pairs.
    async fn size(&self) -> PrimitiveResult<u64>;
}

#[async_trait]
pub trait AsyncMultimapWrite<K: PrimitiveValue, V: PrimitiveValue>: Send + Sync {
    /// Add `value` under `key`. Returns false if it was already present.
    async fn put(&self, key: &K, value: &V) -> PrimitiveResult<bool>;

    /// Add every value. Returns true if any was new.
    async fn put_all(&self, key: &K, values: &[V]) -> PrimitiveResult<bool>;

    async fn remove(&self, key: &K, value: &V) -> PrimitiveResult<bool>;

    /// Remove `key` and return the values it held.
    async fn remove_all(&self, key: &K) -> PrimitiveResult<Versioned<Vec<V>>>;

    async fn clear(&self) -> PrimitiveResult<()>;
}

/// Asynchronous atomic multimap client.
#[async_trait]
pub trait AsyncAtomicMultimap<K: PrimitiveValue, V: PrimitiveValue>:
    AsyncMultimapRead<K, V> + AsyncMultimapWrite<K, V>
{
    fn name(&self) -> &str;

    fn add_listener(&self, listener: Listener<MultimapEvent<K, V>>);

    /// No-op when the listener was never added.
    fn remove_listener(&self, listener: &Listener<MultimapEvent<K, V>>);

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>);

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>);

    async fn close(&self) -> PrimitiveResult<()>;
}

// ============================================================================
// Primitive type
// ============================================================================

/// The `atomic-multimap` primitive type.
#[derive(Debug, Default)]
pub struct AtomicMultimapType;

impl AtomicMultimapType {
    /// The process-wide instance.
    pub fn instance() -> Arc<AtomicMultimapType> {
        static INSTANCE: OnceLock<Arc<AtomicMultimapType>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(AtomicMultimapType)).clone()
    }
}

impl PrimitiveType for AtomicMultimapType {
    fn name(&self) -> &'static str {
        TYPE_NAME
    }

    fn namespace(&self) -> Namespace {
        Namespace::builder()
            .register_all(&Namespace::basic())
            .next_id(100)
            .register::<EncodedValues>()
            .register::<MultimapEntry>()
            .register::<MultimapBatch>()
            .register::<MultimapChange>()
            .register::<MultimapSnapshot>()
            .build()
    }

    fn new_service(&self, config: &ServiceConfig) -> Box<dyn ReplicatedService> {
        Box::new(AtomicMultimapService::new(config, self.namespace()))
    }
}

impl<K, V> PrimitiveBuilderFactory<AtomicMultimapBuilder<K, V>> for AtomicMultimapType
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
{
    type Config = AtomicMultimapConfig;

    fn new_config(&self) -> AtomicMultimapConfig {
        AtomicMultimapConfig::default()
    }

    fn new_builder(
        &self,
        name: &str,
        config: AtomicMultimapConfig,
        management: &PrimitiveManagementService,
    ) -> AtomicMultimapBuilder<K, V> {
        AtomicMultimapBuilder::new(name, config, management)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_ids_are_stable() {
        let namespace = AtomicMultimapType.namespace();
        assert_eq!(namespace.id_of::<EncodedValues>(), Some(100));
        assert_eq!(namespace.id_of::<MultimapEntry>(), Some(101));
        assert_eq!(namespace.id_of::<MultimapBatch>(), Some(102));
        assert_eq!(namespace.id_of::<MultimapChange>(), Some(103));
        assert_eq!(namespace.id_of::<MultimapSnapshot>(), Some(104));
        assert_eq!(namespace.id_of::<String>(), Namespace::basic().id_of::<String>());
    }
}
