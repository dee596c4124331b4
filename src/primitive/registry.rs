//! Primitive type registry.
//!
//! Binds a primitive name such as `atomic-multimap` to the namespace its
//! values are encoded with, the replicated service the cluster runs for it
//! and the builder clients use to reach it.

use super::management::PrimitiveManagementService;
use super::service::{ReplicatedService, ServiceConfig};
use crate::counter::AtomicCounterType;
use crate::multimap::AtomicMultimapType;
use crate::set::AtomicSetType;
use dashmap::DashMap;
use replikit_cluster::Namespace;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A kind of distributed primitive.
pub trait PrimitiveType: Send + Sync + 'static {
    /// Unique registry key.
    fn name(&self) -> &'static str;

    /// Types the serializer must know to encode this primitive's operations,
    /// results, events and snapshots. Ids must stay stable across releases.
    fn namespace(&self) -> Namespace;

    /// Construct the server-side state machine for one primitive instance.
    fn new_service(&self, config: &ServiceConfig) -> Box<dyn ReplicatedService>;
}

/// Produces client builders of type `B` for a primitive type.
pub trait PrimitiveBuilderFactory<B>: PrimitiveType {
    type Config: Default;

    fn new_config(&self) -> Self::Config {
        Self::Config::default()
    }

    fn new_builder(
        &self,
        name: &str,
        config: Self::Config,
        management: &PrimitiveManagementService,
    ) -> B;
}

/// Registry of primitive types keyed by name.
#[derive(Default)]
pub struct PrimitiveTypeRegistry {
    types: DashMap<&'static str, Arc<dyn PrimitiveType>>,
}

impl PrimitiveTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in primitive type.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(AtomicMultimapType::instance());
        registry.register(AtomicCounterType::instance());
        registry.register(AtomicSetType::instance());
        registry
    }

    /// Process-wide registry pre-populated with the built-in types.
    pub fn global() -> Arc<PrimitiveTypeRegistry> {
        static GLOBAL: OnceLock<Arc<PrimitiveTypeRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    /// Register a type. Returns the instance already registered under the
    /// same name if there is one.
    pub fn register(&self, primitive_type: Arc<dyn PrimitiveType>) -> Arc<dyn PrimitiveType> {
        let name = primitive_type.name();
        let registered = self
            .types
            .entry(name)
            .or_insert_with(|| {
                debug!(primitive_type = %name, "registered primitive type");
                primitive_type
            })
            .clone();
        registered
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PrimitiveType>> {
        self.types.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.iter().map(|entry| *entry.key()).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for PrimitiveTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveTypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::primitive::Commit;
    use bytes::Bytes;

    struct NullType;

    struct NullService;

    impl ReplicatedService for NullService {
        fn apply(&mut self, _commit: &mut Commit) -> Result<Bytes, CommandError> {
            Ok(Bytes::new())
        }

        fn snapshot(&self) -> Result<Bytes, CommandError> {
            Ok(Bytes::new())
        }

        fn restore(&mut self, _snapshot: &[u8]) -> Result<(), CommandError> {
            Ok(())
        }
    }

    impl PrimitiveType for NullType {
        fn name(&self) -> &'static str {
            "null"
        }

        fn namespace(&self) -> Namespace {
            Namespace::basic()
        }

        fn new_service(&self, _config: &ServiceConfig) -> Box<dyn ReplicatedService> {
            Box::new(NullService)
        }
    }

    fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
        Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
    }

    #[test]
    fn reregistration_returns_first_instance() {
        let registry = PrimitiveTypeRegistry::new();
        let first = registry.register(Arc::new(NullType));
        let second = registry.register(Arc::new(NullType));
        assert!(same(&first, &second));
        assert!(same(&first, &registry.get("null").unwrap()));
        assert_eq!(registry.names(), vec!["null"]);
    }

    #[test]
    fn global_registry_holds_builtins() {
        let registry = PrimitiveTypeRegistry::global();
        assert_eq!(registry.names(), vec!["atomic-counter", "atomic-multimap", "atomic-set"]);
        assert!(same(&registry, &PrimitiveTypeRegistry::global()));

        let multimap: Arc<dyn PrimitiveType> = AtomicMultimapType::instance();
        assert!(same(&multimap, &registry.get("atomic-multimap").unwrap()));
        assert!(same(&registry.register(AtomicMultimapType::instance()), &multimap));
    }

    #[test]
    fn unknown_type_is_absent() {
        assert!(PrimitiveTypeRegistry::new().get("atomic-multimap").is_none());
    }
}
