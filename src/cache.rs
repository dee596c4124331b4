//! Bounded read cache with event-driven invalidation.
//!
//! Entries live in a `moka` cache bounded by capacity and optional TTL.
//! Fills are guarded by an invalidation epoch: a fill begun before an
//! invalidation is discarded, so a value fetched before a change event can
//! never be stored after the event removed its key.

use crate::config::CacheConfig;
use crate::metrics;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::hash::Hash;
use tracing::trace;

/// Marks the invalidation epoch observed when a fetch started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillToken(u64);

/// Read-through cache owned by one caching wrapper.
pub struct ReadCache<K, V> {
    name: String,
    entries: Cache<K, V>,
    epoch: Mutex<u64>,
}

impl<K, V> ReadCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl() {
            builder = builder.time_to_live(ttl);
        }
        Self {
            name: name.into(),
            entries: builder.build(),
            epoch: Mutex::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.entries.get(key);
        metrics::record_cache_lookup(&self.name, value.is_some());
        value
    }

    /// Call before fetching a value that will be passed to [`ReadCache::fill`].
    pub fn begin_fill(&self) -> FillToken {
        FillToken(*self.epoch.lock())
    }

    /// Store a fetched value unless an invalidation happened since `token`.
    pub fn fill(&self, key: K, value: V, token: FillToken) -> bool {
        let epoch = self.epoch.lock();
        if *epoch != token.0 {
            trace!(cache = %self.name, "discarding fill that raced an invalidation");
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn invalidate(&self, key: &K) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.entries.invalidate(key);
        metrics::record_cache_invalidation(&self.name);
    }

    pub fn invalidate_all(&self) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.entries.invalidate_all();
        metrics::record_cache_invalidation(&self.name);
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl<K, V> std::fmt::Debug for ReadCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCache")
            .field("name", &self.name)
            .field("epoch", &*self.epoch.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache() -> ReadCache<String, u32> {
        ReadCache::new("test", &CacheConfig::with_capacity(16))
    }

    #[test]
    fn fill_then_hit() {
        let cache = cache();
        assert_eq!(cache.get(&"k".to_string()), None);
        let token = cache.begin_fill();
        assert!(cache.fill("k".to_string(), 1, token));
        assert_eq!(cache.get(&"k".to_string()), Some(1));
    }

    #[test]
    fn fill_racing_an_invalidation_is_discarded() {
        let cache = cache();
        let token = cache.begin_fill();
        cache.invalidate(&"k".to_string());
        assert!(!cache.fill("k".to_string(), 1, token));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn invalidate_all_clears_entries() {
        let cache = cache();
        for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
            let token = cache.begin_fill();
            cache.fill(key.to_string(), i as u32, token);
        }
        cache.invalidate_all();
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let config = CacheConfig {
            enabled: true,
            max_capacity: 16,
            ttl_ms: Some(10),
        };
        let cache = ReadCache::new("ttl", &config);
        let token = cache.begin_fill();
        cache.fill("k".to_string(), 1u32, token);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"k".to_string()), None);
    }
}
