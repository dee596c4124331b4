//! Integration tests for the blocking facade.
//!
//! These run on plain test threads against a multi-threaded runtime, the
//! way a synchronous caller would use the library.

mod common;

use common::{ScriptedTransport, local_management, three_member_view};
use replikit::config::{CacheConfig, Config, SyncConfig};
use replikit::{PrimitiveError, PrimitiveManagementService};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime")
}

#[test]
fn test_blocking_multimap_round_trip() {
    let runtime = runtime();
    let (transport, management) = local_management(&Config::default(), runtime.handle().clone());

    let multimap = management
        .atomic_multimap_builder::<String, u32>("scores")
        .with_cache(CacheConfig::with_capacity(32))
        .build_sync()
        .expect("build");

    assert_eq!(multimap.name(), "scores");
    assert!(multimap.put("alice".to_string(), 7).expect("put"));
    assert!(!multimap.put("alice".to_string(), 7).expect("duplicate put"));
    assert!(multimap.put_all("alice".to_string(), vec![8, 9]).expect("put_all"));

    let mut values = multimap.get("alice".to_string()).expect("get").value;
    values.sort_unstable();
    assert_eq!(values, vec![7, 8, 9]);
    assert!(multimap.contains_key("alice".to_string()).expect("contains_key"));
    assert_eq!(multimap.size().expect("size"), 3);

    assert!(multimap.remove("alice".to_string(), 8).expect("remove"));
    assert_eq!(multimap.remove_all("alice".to_string()).expect("remove_all").value.len(), 2);
    assert_eq!(multimap.size().expect("size"), 0);

    multimap.close().expect("close");
    assert_eq!(transport.session_count(), 0);
}

#[test]
fn test_blocking_counter_operations() {
    let runtime = runtime();
    let (_transport, management) = local_management(&Config::default(), runtime.handle().clone());

    let counter = management
        .atomic_counter_builder("requests")
        .build_sync()
        .expect("build");

    assert_eq!(counter.get().expect("get"), 0);
    assert_eq!(counter.increment_and_get().expect("increment"), 1);
    assert_eq!(counter.add_and_get(10).expect("add"), 11);
    assert!(counter.compare_and_set(11, 20).expect("cas"));
    assert!(!counter.compare_and_set(11, 30).expect("cas"));
    counter.set(-5).expect("set");
    assert_eq!(counter.get().expect("get"), -5);
    counter.close().expect("close");
}

#[test]
fn test_blocking_set_navigation() {
    let runtime = runtime();
    let (_transport, management) = local_management(&Config::default(), runtime.handle().clone());

    let set = management
        .atomic_set_builder::<String>("names")
        .with_cache(CacheConfig::with_capacity(16))
        .build_sync()
        .expect("build");

    assert!(set.add_all(vec!["carol".to_string(), "alice".to_string(), "bob".to_string()]).expect("add_all"));
    assert!(set.contains("bob".to_string()).expect("contains"));
    assert_eq!(set.first().expect("first"), Some("alice".to_string()));
    assert_eq!(set.ceiling("b".to_string()).expect("ceiling"), Some("bob".to_string()));
    assert_eq!(set.lower("bob".to_string()).expect("lower"), Some("alice".to_string()));
    assert_eq!(set.poll_last().expect("poll_last"), Some("carol".to_string()));
    assert_eq!(set.size().expect("size"), 2);
    set.close().expect("close");
}

#[test]
fn test_blocking_call_times_out() {
    let runtime = runtime();
    let config = Config {
        sync: SyncConfig { timeout_ms: 50 },
        ..Config::default()
    };
    let transport = Arc::new(ScriptedTransport::holding());
    let management = PrimitiveManagementService::new(
        transport.clone(),
        three_member_view(),
        &config,
        runtime.handle().clone(),
    );

    let counter = management
        .atomic_counter_builder("stalled")
        .build_sync()
        .expect("connect is not held");
    let result = counter.get();
    assert!(
        matches!(result, Err(PrimitiveError::Timeout(timeout)) if timeout == Duration::from_millis(50)),
        "expected timeout, got {result:?}"
    );
    assert_eq!(transport.held_sequences().len(), 1);
    counter.close().expect("close");
}

#[test]
fn test_blocking_from_runtime_thread_is_rejected() {
    let runtime = runtime();
    let (_transport, management) = local_management(&Config::default(), runtime.handle().clone());

    let result = runtime.block_on(async move {
        management.atomic_counter_builder("misuse").build_sync().map(|_| ())
    });
    assert!(matches!(result, Err(PrimitiveError::BlockingOnRuntime)));
}

#[test]
fn test_spawn_blocking_workers_are_rejected_but_std_threads_are_not() {
    let runtime = runtime();
    let (_transport, management) = local_management(&Config::default(), runtime.handle().clone());
    let counter = Arc::new(management.atomic_counter_builder("offload").build_sync().expect("build"));

    let on_worker = counter.clone();
    let result = runtime
        .block_on(runtime.spawn_blocking(move || on_worker.get()))
        .expect("spawn_blocking join");
    assert!(matches!(result, Err(PrimitiveError::BlockingOnRuntime)));

    let on_thread = counter.clone();
    let value = runtime.block_on(async move {
        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::spawn(move || {
            let _ = tx.send(on_thread.increment_and_get());
        });
        rx.await.expect("thread result")
    });
    assert_eq!(value.expect("increment from std thread"), 1);
    counter.close().expect("close");
}

#[test]
fn test_unknown_primitive_type_is_rejected() {
    let runtime = runtime();
    let (_transport, management) = local_management(&Config::default(), runtime.handle().clone());

    let result = management.session_client("anything", "no-such-type");
    assert!(matches!(result, Err(PrimitiveError::UnknownType(name)) if name == "no-such-type"));
}
