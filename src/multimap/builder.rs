//! Builder for atomic multimap clients.

use super::{AsyncAtomicMultimap, AtomicMultimapType, BlockingAtomicMultimap, CachingAsyncMultimap, MultimapProxy, TYPE_NAME};
use crate::blocking::Blocking;
use crate::config::CacheConfig;
use crate::error::PrimitiveResult;
use crate::primitive::{
    PrimitiveManagementService, PrimitiveProxy, PrimitiveType, PrimitiveValue, client_serializer, ensure_registered,
};
use replikit_cluster::Namespace;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Client-side configuration of one atomic multimap.
#[derive(Debug, Clone, Default)]
pub struct AtomicMultimapConfig {
    /// Read cache policy. `None` uses the management service default.
    pub cache: Option<CacheConfig>,
    /// Extra types the key and value types need for encoding.
    pub namespace: Option<Namespace>,
}

/// Builds connected atomic multimap clients.
pub struct AtomicMultimapBuilder<K, V> {
    name: String,
    config: AtomicMultimapConfig,
    management: PrimitiveManagementService,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> AtomicMultimapBuilder<K, V>
where
    K: PrimitiveValue + Hash + Eq,
    V: PrimitiveValue,
{
    pub fn new(name: &str, config: AtomicMultimapConfig, management: &PrimitiveManagementService) -> Self {
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

    /// Connect and return the asynchronous client, cached when enabled.
    pub async fn build(self) -> PrimitiveResult<Arc<dyn AsyncAtomicMultimap<K, V>>> {
        let serializer = client_serializer(
            &AtomicMultimapType::instance().namespace(),
            self.config.namespace.as_ref(),
        );
        ensure_registered::<K>(&serializer)?;
        ensure_registered::<V>(&serializer)?;

        let client = self.management.session_client(&self.name, TYPE_NAME)?;
        client.connect().await?;
        let proxy = Arc::new(MultimapProxy::<K, V>::new(PrimitiveProxy::new(client, serializer)));

        let cache = self
            .config
            .cache
            .unwrap_or_else(|| self.management.cache_config().clone());
        info!(primitive = %self.name, cached = cache.enabled, "built atomic multimap");
        if cache.enabled {
            Ok(Arc::new(CachingAsyncMultimap::new(proxy, &cache)))
        } else {
            Ok(proxy)
        }
    }

    /// Build from a thread outside the runtime and return the blocking facade.
    pub fn build_sync(self) -> PrimitiveResult<BlockingAtomicMultimap<K, V>> {
        let blocking = Blocking::new(
            self.management.contexts().handle().clone(),
            self.management.sync_config().timeout(),
        );
        let delegate = blocking.wait(self.build())?;
        Ok(BlockingAtomicMultimap::new(delegate, blocking))
    }
}

impl<K, V> std::fmt::Debug for AtomicMultimapBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicMultimapBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
