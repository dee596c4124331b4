//! Atomic navigable set primitive.
//!
//! A replicated sorted set. The replica orders elements by a sort key the
//! client derives from each element, so `first`, `floor` and the other
//! navigation queries agree with the element type's own ordering without
//! the replica decoding anything.
//!
//! ```text
//! BlockingAtomicSet ──▶ CachingAsyncSet ──▶ SetProxy ──▶ session
//!   (sync facade)     (membership cache)   (encoding)
//! ```

mod blocking;
mod builder;
mod caching;
mod proxy;
mod service;

pub use blocking::BlockingAtomicSet;
pub use builder::{AtomicSetBuilder, AtomicSetConfig};
pub use caching::CachingAsyncSet;
pub use proxy::SetProxy;
pub use service::AtomicSetService;

pub use crate::multimap::ChangeKind;

use crate::error::PrimitiveResult;
use crate::primitive::{
    PrimitiveBuilderFactory, PrimitiveManagementService, PrimitiveState, PrimitiveType, PrimitiveValue,
    ReplicatedService, ServiceConfig,
};
use async_trait::async_trait;
use replikit_cluster::{Listener, Namespace};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

/// Registry name of the atomic set type.
pub const TYPE_NAME: &str = "atomic-set";

/// Event type of change notifications.
pub const CHANGE_EVENT: &str = "change";

/// Operation names understood by [`AtomicSetService`].
pub mod ops {
    pub const ADD: &str = "add";
    pub const ADD_ALL: &str = "add_all";
    pub const REMOVE: &str = "remove";
    pub const CONTAINS: &str = "contains";
    pub const SIZE: &str = "size";
    pub const CLEAR: &str = "clear";
    pub const ELEMENTS: &str = "elements";
    pub const FIRST: &str = "first";
    pub const LAST: &str = "last";
    pub const FLOOR: &str = "floor";
    pub const CEILING: &str = "ceiling";
    pub const LOWER: &str = "lower";
    pub const HIGHER: &str = "higher";
    pub const POLL_FIRST: &str = "poll_first";
    pub const POLL_LAST: &str = "poll_last";
}

// ============================================================================
// Element ordering
// ============================================================================

/// An element of an atomic set.
///
/// `sort_key` must be injective and must order byte-wise the same way the
/// element orders: `a < b` exactly when `a.sort_key() < b.sort_key()`.
pub trait SetElement: PrimitiveValue + Hash + Eq {
    fn sort_key(&self) -> Vec<u8>;
}

impl SetElement for String {
    fn sort_key(&self) -> Vec<u8> {
        // UTF-8 byte order is code point order.
        self.as_bytes().to_vec()
    }
}

impl SetElement for Vec<u8> {
    fn sort_key(&self) -> Vec<u8> {
        self.clone()
    }
}

impl SetElement for bool {
    fn sort_key(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

impl SetElement for u32 {
    fn sort_key(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl SetElement for u64 {
    fn sort_key(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl SetElement for i64 {
    fn sort_key(&self) -> Vec<u8> {
        // Flipping the sign bit maps i64 order onto u64 order.
        ((*self as u64) ^ (1 << 63)).to_be_bytes().to_vec()
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// An element as the replica stores it: its sort key and its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Payload of a `change` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetChange {
    pub kind: ChangeKind,
    pub value: Vec<u8>,
}

/// Service state captured by a snapshot, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSnapshot {
    pub entries: Vec<SetEntry>,
}

/// A decoded change event delivered to set listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEvent<E> {
    pub kind: ChangeKind,
    pub element: E,
}

// ============================================================================
// Capability traits
// ============================================================================

#[async_trait]
pub trait AsyncSetRead<E: SetElement>: Send + Sync {
    async fn contains(&self, element: &E) -> PrimitiveResult<bool>;

    async fn size(&self) -> PrimitiveResult<u64>;

    /// Every element in ascending order.
    async fn elements(&self) -> PrimitiveResult<Vec<E>>;
}

#[async_trait]
pub trait AsyncSetWrite<E: SetElement>: Send + Sync {
    /// Returns false if the element was already present.
    async fn add(&self, element: &E) -> PrimitiveResult<bool>;

    /// Returns true if any element was new.
    async fn add_all(&self, elements: &[E]) -> PrimitiveResult<bool>;

    async fn remove(&self, element: &E) -> PrimitiveResult<bool>;

    async fn clear(&self) -> PrimitiveResult<()>;
}

/// Ordered queries over the set. Every query is `None` when no element
/// qualifies.
#[async_trait]
pub trait AsyncNavigableSet<E: SetElement>: Send + Sync {
    async fn first(&self) -> PrimitiveResult<Option<E>>;

    async fn last(&self) -> PrimitiveResult<Option<E>>;

    /// Greatest element less than or equal to `element`.
    async fn floor(&self, element: &E) -> PrimitiveResult<Option<E>>;

    /// Least element greater than or equal to `element`.
    async fn ceiling(&self, element: &E) -> PrimitiveResult<Option<E>>;

    /// Greatest element strictly less than `element`.
    async fn lower(&self, element: &E) -> PrimitiveResult<Option<E>>;

    /// Least element strictly greater than `element`.
    async fn higher(&self, element: &E) -> PrimitiveResult<Option<E>>;

    /// Remove and return the least element.
    async fn poll_first(&self) -> PrimitiveResult<Option<E>>;

    /// Remove and return the greatest element.
    async fn poll_last(&self) -> PrimitiveResult<Option<E>>;
}

/// Asynchronous atomic set client.
#[async_trait]
pub trait AsyncAtomicSet<E: SetElement>: AsyncSetRead<E> + AsyncSetWrite<E> + AsyncNavigableSet<E> {
    fn name(&self) -> &str;

    fn add_listener(&self, listener: Listener<SetEvent<E>>);

    /// No-op when the listener was never added.
    fn remove_listener(&self, listener: &Listener<SetEvent<E>>);

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>);

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>);

    async fn close(&self) -> PrimitiveResult<()>;
}

// ============================================================================
// Primitive type
// ============================================================================

/// The `atomic-set` primitive type.
#[derive(Debug, Default)]
pub struct AtomicSetType;

impl AtomicSetType {
    /// The process-wide instance.
    pub fn instance() -> Arc<AtomicSetType> {
        static INSTANCE: OnceLock<Arc<AtomicSetType>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(AtomicSetType)).clone()
    }
}

impl PrimitiveType for AtomicSetType {
    fn name(&self) -> &'static str {
        TYPE_NAME
    }

    fn namespace(&self) -> Namespace {
        Namespace::builder()
            .register_all(&Namespace::basic())
            .next_id(100)
            .register::<SetEntry>()
            .register::<Vec<SetEntry>>()
            .register::<SetChange>()
            .register::<SetSnapshot>()
            .build()
    }

    fn new_service(&self, config: &ServiceConfig) -> Box<dyn ReplicatedService> {
        Box::new(AtomicSetService::new(config, self.namespace()))
    }
}

impl<E: SetElement> PrimitiveBuilderFactory<AtomicSetBuilder<E>> for AtomicSetType {
    type Config = AtomicSetConfig;

    fn new_config(&self) -> AtomicSetConfig {
        AtomicSetConfig::default()
    }

    fn new_builder(&self, name: &str, config: AtomicSetConfig, management: &PrimitiveManagementService) -> AtomicSetBuilder<E> {
        AtomicSetBuilder::new(name, config, management)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_ids_are_stable() {
        let namespace = AtomicSetType.namespace();
        assert_eq!(namespace.id_of::<SetEntry>(), Some(100));
        assert_eq!(namespace.id_of::<Vec<SetEntry>>(), Some(101));
        assert_eq!(namespace.id_of::<SetChange>(), Some(102));
        assert_eq!(namespace.id_of::<SetSnapshot>(), Some(103));
    }

    #[test]
    fn sort_keys_follow_element_order() {
        let mut numbers = vec![i64::MAX, 3, -1, 0, i64::MIN, -300];
        let mut by_key = numbers.clone();
        numbers.sort_unstable();
        by_key.sort_by_key(|n| n.sort_key());
        assert_eq!(by_key, numbers);

        assert!(7u64.sort_key() < 256u64.sort_key());
        assert!(false.sort_key() < true.sort_key());
        assert!("apple".to_string().sort_key() < "banana".to_string().sort_key());
        assert!("z".to_string().sort_key() < "é".to_string().sort_key());
    }
}
