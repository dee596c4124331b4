//! Primitive management service.
//!
//! Bundles what a builder needs to produce a connected primitive client:
//! the transport, the membership view, dispatch contexts, the type registry
//! and the configured policies.

use super::registry::{PrimitiveBuilderFactory, PrimitiveTypeRegistry};
use crate::config::{CacheConfig, Config, SessionConfig, SyncConfig};
use crate::counter::{AtomicCounterBuilder, AtomicCounterType};
use crate::dispatch::{ContextSessionClient, ThreadContextFactory};
use crate::error::{PrimitiveError, PrimitiveResult};
use crate::multimap::{AtomicMultimapBuilder, AtomicMultimapType};
use crate::primitive::PrimitiveValue;
use crate::session::{DefaultSessionClient, SessionClient, Transport};
use crate::set::{AtomicSetBuilder, AtomicSetType, SetElement};
use crate::telemetry::spans;
use replikit_cluster::MembershipView;
use std::hash::Hash;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Shared services handed to primitive builders.
#[derive(Clone)]
pub struct PrimitiveManagementService {
    transport: Arc<dyn Transport>,
    membership: Arc<dyn MembershipView>,
    contexts: Arc<ThreadContextFactory>,
    registry: Arc<PrimitiveTypeRegistry>,
    session: SessionConfig,
    cache: CacheConfig,
    sync: SyncConfig,
}

impl PrimitiveManagementService {
    /// Create a management service on the given runtime using the global
    /// type registry.
    pub fn new(
        transport: Arc<dyn Transport>,
        membership: Arc<dyn MembershipView>,
        config: &Config,
        handle: Handle,
    ) -> Self {
        Self {
            transport,
            membership,
            contexts: Arc::new(ThreadContextFactory::new(config.dispatch.mode, handle)),
            registry: PrimitiveTypeRegistry::global(),
            session: config.session.clone(),
            cache: config.cache.clone(),
            sync: config.sync.clone(),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PrimitiveTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    #[must_use]
    pub fn membership(&self) -> &Arc<dyn MembershipView> {
        &self.membership
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PrimitiveTypeRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn contexts(&self) -> &ThreadContextFactory {
        &self.contexts
    }

    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    #[must_use]
    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }

    /// A context-dispatched session client for the primitive `name`.
    ///
    /// The client is not connected yet.
    pub fn session_client(&self, name: &str, primitive_type: &str) -> PrimitiveResult<Arc<dyn SessionClient>> {
        if !self.registry.contains(primitive_type) {
            return Err(PrimitiveError::UnknownType(primitive_type.to_string()));
        }
        let _span = spans::session(name, primitive_type).entered();
        let client = DefaultSessionClient::new(
            name,
            primitive_type,
            self.transport.clone(),
            self.membership.clone(),
            self.session.clone(),
        );
        let context = self.contexts.context(name);
        debug!(context = %context.name(), "created session client");
        Ok(Arc::new(ContextSessionClient::new(Arc::new(client), context)))
    }

    /// A builder produced by `factory` with its default configuration.
    pub fn primitive_builder<B, F>(&self, factory: &F, name: &str) -> B
    where
        F: PrimitiveBuilderFactory<B>,
    {
        factory.new_builder(name, factory.new_config(), self)
    }

    pub fn atomic_multimap_builder<K, V>(&self, name: &str) -> AtomicMultimapBuilder<K, V>
    where
        K: PrimitiveValue + Hash + Eq,
        V: PrimitiveValue,
    {
        self.primitive_builder(AtomicMultimapType::instance().as_ref(), name)
    }

    pub fn atomic_counter_builder(&self, name: &str) -> AtomicCounterBuilder {
        self.primitive_builder(AtomicCounterType::instance().as_ref(), name)
    }

    pub fn atomic_set_builder<E: SetElement>(&self, name: &str) -> AtomicSetBuilder<E> {
        self.primitive_builder(AtomicSetType::instance().as_ref(), name)
    }
}

impl std::fmt::Debug for PrimitiveManagementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveManagementService")
            .field("local_member", &self.membership.local_member())
            .field("registry", &self.registry)
            .field("dispatch", &self.contexts.mode())
            .finish()
    }
}
