//! Builder for atomic set clients.

use super::{AsyncAtomicSet, AtomicSetType, BlockingAtomicSet, CachingAsyncSet, SetElement, SetProxy, TYPE_NAME};
use crate::blocking::Blocking;
use crate::config::CacheConfig;
use crate::error::PrimitiveResult;
use crate::primitive::{PrimitiveManagementService, PrimitiveProxy, PrimitiveType, client_serializer, ensure_registered};
use replikit_cluster::Namespace;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Client-side configuration of one atomic set.
#[derive(Debug, Clone, Default)]
pub struct AtomicSetConfig {
    /// Membership cache policy. `None` uses the management service default.
    pub cache: Option<CacheConfig>,
    /// Extra types the element type needs for encoding.
    pub namespace: Option<Namespace>,
}

/// Builds connected atomic set clients.
pub struct AtomicSetBuilder<E> {
    name: String,
    config: AtomicSetConfig,
    management: PrimitiveManagementService,
    _marker: PhantomData<fn() -> E>,
}

impl<E: SetElement> AtomicSetBuilder<E> {
    pub fn new(name: &str, config: AtomicSetConfig, management: &PrimitiveManagementService) -> Self {
        Self {
            name: name.to_string(),
            config,
            management: management.clone(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.config.namespace = Some(namespace);
        self
    }

    pub async fn build(self) -> PrimitiveResult<Arc<dyn AsyncAtomicSet<E>>> {
        let serializer = client_serializer(&AtomicSetType::instance().namespace(), self.config.namespace.as_ref());
        ensure_registered::<E>(&serializer)?;

        let client = self.management.session_client(&self.name, TYPE_NAME)?;
        client.connect().await?;
        let proxy = Arc::new(SetProxy::<E>::new(PrimitiveProxy::new(client, serializer)));

        let cache = self
            .config
            .cache
            .unwrap_or_else(|| self.management.cache_config().clone());
        info!(primitive = %self.name, cached = cache.enabled, "built atomic set");
        if cache.enabled {
            Ok(Arc::new(CachingAsyncSet::new(proxy, &cache)))
        } else {
            Ok(proxy)
        }
    }

    pub fn build_sync(self) -> PrimitiveResult<BlockingAtomicSet<E>> {
        let blocking = Blocking::new(
            self.management.contexts().handle().clone(),
            self.management.sync_config().timeout(),
        );
        let delegate = blocking.wait(self.build())?;
        Ok(BlockingAtomicSet::new(delegate, blocking))
    }
}

impl<E> std::fmt::Debug for AtomicSetBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicSetBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
