//! Integration tests for the caching multimap client.
//!
//! Two clients share one replica. The cached client may serve stale reads
//! only until the change event for a key reaches its listeners.

mod common;

use common::{eventually, local_management};
use parking_lot::Mutex;
use replikit::config::{CacheConfig, Config};
use replikit::multimap::{
    AsyncAtomicMultimap, AsyncMultimapRead, AsyncMultimapWrite, AtomicMultimapType, CachingAsyncMultimap,
    ChangeKind, MultimapEvent, MultimapProxy, TYPE_NAME,
};
use replikit::primitive::{PrimitiveProxy, PrimitiveType, client_serializer};
use replikit_cluster::Listener;
use std::sync::Arc;
use tokio::runtime::Handle;

type Seen = Arc<Mutex<Vec<(ChangeKind, String)>>>;

/// Listener recording the value of every change event.
fn recorder() -> (Seen, Listener<MultimapEvent<String, String>>) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = Listener::new(move |event: MultimapEvent<String, String>| {
        sink.lock().push((event.kind, event.value));
    });
    (seen, listener)
}

fn saw_insert(seen: &Seen, value: &str) -> bool {
    seen.lock()
        .iter()
        .any(|(kind, seen)| *kind == ChangeKind::Insert && seen == value)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_write_visible_after_event() {
    let (_transport, management) = local_management(&Config::default(), Handle::current());
    let cached = management
        .atomic_multimap_builder::<String, String>("members")
        .with_cache(CacheConfig::with_capacity(128))
        .build()
        .await
        .expect("cached client");
    let writer = management
        .atomic_multimap_builder::<String, String>("members")
        .build()
        .await
        .expect("writer client");

    let (seen, listener) = recorder();
    cached.add_listener(listener);

    let key = "group".to_string();
    assert!(cached.put(&key, &"v1".to_string()).await.expect("put v1"));
    let first = cached.get(&key).await.expect("get");
    assert_eq!(first.value, vec!["v1".to_string()]);
    // Served from cache.
    assert_eq!(cached.get(&key).await.expect("get"), first);

    assert!(writer.put(&key, &"v2".to_string()).await.expect("put v2"));
    assert!(eventually(|| saw_insert(&seen, "v2")).await, "event reached listener");

    let fresh = cached.get(&key).await.expect("get");
    assert!(fresh.value.contains(&"v2".to_string()));
    assert!(fresh.version > first.version);

    cached.close().await.expect("close");
    writer.close().await.expect("close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_own_writes_invalidate_immediately() {
    let (_transport, management) = local_management(&Config::default(), Handle::current());
    let cached = management
        .atomic_multimap_builder::<String, String>("own-writes")
        .with_cache(CacheConfig::with_capacity(128))
        .build()
        .await
        .expect("cached client");

    let key = "k".to_string();
    let empty = cached.get(&key).await.expect("get");
    assert!(empty.value.is_empty());
    assert_eq!(empty.version, 0);

    assert!(cached.put(&key, &"a".to_string()).await.expect("put"));
    assert_eq!(cached.get(&key).await.expect("get").value, vec!["a".to_string()]);

    assert!(cached.put_all(&key, &["b".to_string(), "c".to_string()]).await.expect("put_all"));
    assert_eq!(cached.get(&key).await.expect("get").value.len(), 3);

    assert!(cached.remove(&key, &"a".to_string()).await.expect("remove"));
    let removed = cached.remove_all(&key).await.expect("remove_all");
    assert_eq!(removed.value.len(), 2);
    assert!(cached.get(&key).await.expect("get").value.is_empty());

    cached.put(&key, &"d".to_string()).await.expect("put");
    cached.clear().await.expect("clear");
    assert!(!cached.contains_key(&key).await.expect("contains_key"));
    assert_eq!(cached.size().await.expect("size"), 0);
    cached.close().await.expect("close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_leaving_connected_drops_cache() {
    let (transport, management) = local_management(&Config::default(), Handle::current());
    let client = management.session_client("suspending", TYPE_NAME).expect("session client");
    client.connect().await.expect("connect");
    let serializer = client_serializer(&AtomicMultimapType::instance().namespace(), None);
    let proxy = Arc::new(MultimapProxy::<String, String>::new(PrimitiveProxy::new(client, serializer)));
    let cached = CachingAsyncMultimap::new(proxy, &CacheConfig::with_capacity(16));

    for key in ["a", "b", "c"] {
        cached.put(&key.to_string(), &"x".to_string()).await.expect("put");
        cached.get(&key.to_string()).await.expect("get");
    }
    assert_eq!(cached.cache().entry_count(), 3);

    transport.suspend_all();
    assert!(eventually(|| cached.cache().entry_count() == 0).await);
    transport.recover_all();

    assert_eq!(cached.get(&"a".to_string()).await.expect("get").value, vec!["x".to_string()]);
    cached.close().await.expect("close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cached_reads_converge_over_many_writes() {
    let (_transport, management) = local_management(&Config::default(), Handle::current());
    let cached = management
        .atomic_multimap_builder::<String, String>("converge")
        .with_cache(CacheConfig::with_capacity(8))
        .build()
        .await
        .expect("cached client");
    let writer = management
        .atomic_multimap_builder::<String, String>("converge")
        .build()
        .await
        .expect("writer client");

    let (seen, listener) = recorder();
    cached.add_listener(listener.clone());
    let key = "k".to_string();

    for round in 0..20 {
        // Warm the cache, then change the key behind its back.
        cached.get(&key).await.expect("get");
        let value = format!("v{round}");
        writer.put(&key, &value).await.expect("put");
        assert!(eventually(|| saw_insert(&seen, &value)).await);
        assert!(cached.get(&key).await.expect("get").value.contains(&value));
    }

    cached.remove_listener(&listener);
    cached.remove_listener(&listener);
    cached.close().await.expect("close");
    writer.close().await.expect("close");
}
