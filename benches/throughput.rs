use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use replikit::config::Config;
use replikit::dispatch::{OrderedRelay, ThreadContext};
use replikit::multimap::{AsyncAtomicMultimap, AsyncMultimapWrite, AtomicMultimapType, MultimapEntry};
use replikit::primitive::PrimitiveType;
use replikit::{LocalTransport, PrimitiveManagementService, PrimitiveTypeRegistry};
use replikit_cluster::{ClusterBuilder, MemberId, Serializer};
use std::sync::Arc;
use tokio::sync::oneshot;

// Measures the per-operation overhead of the client layers against the
// in-process replica, so transport latency is not part of the numbers.

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn encoding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    let serializer = Serializer::new(AtomicMultimapType::instance().namespace());
    let entry = MultimapEntry {
        key: b"session:42".to_vec(),
        value: b"member-7".to_vec(),
    };
    let encoded = serializer.encode(&entry).unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode_entry", |b| b.iter(|| serializer.encode(&entry).unwrap()));
    group.bench_function("decode_entry", |b| {
        b.iter(|| serializer.decode::<MultimapEntry>(&encoded).unwrap())
    });

    group.finish();
}

fn relay_benchmark(c: &mut Criterion) {
    let runtime = runtime();
    let relay = OrderedRelay::new(ThreadContext::spawn_on("bench", runtime.handle()));
    let mut group = c.benchmark_group("relay");
    const BATCH: u64 = 64;
    group.throughput(Throughput::Elements(BATCH));

    // Completions arrive newest first; delivery still follows reservation.
    group.bench_function("reverse_completion", |b| {
        b.to_async(&runtime).iter(|| async {
            let (tx, rx) = oneshot::channel();
            let mut tickets: Vec<_> = (0..BATCH).map(|_| relay.reserve()).collect();
            let last = tickets.pop().unwrap();
            last.complete(move || {
                let _ = tx.send(());
            });
            while let Some(ticket) = tickets.pop() {
                ticket.complete(|| {});
            }
            rx.await.unwrap();
        })
    });

    group.finish();
}

fn multimap_benchmark(c: &mut Criterion) {
    let runtime = runtime();
    let registry = PrimitiveTypeRegistry::global();
    let transport = Arc::new(LocalTransport::new(registry));
    let membership = ClusterBuilder::new()
        .with_member_id(MemberId::new(1))
        .build()
        .unwrap();
    let management =
        PrimitiveManagementService::new(transport, membership, &Config::default(), runtime.handle().clone());
    let multimap = runtime
        .block_on(management.atomic_multimap_builder::<String, u64>("bench").build())
        .unwrap();

    let mut group = c.benchmark_group("multimap");
    group.throughput(Throughput::Elements(1));
    let key = "key".to_string();
    let mut value = 0u64;
    group.bench_function("put", |b| {
        b.to_async(&runtime).iter(|| {
            value += 1;
            let multimap = multimap.clone();
            let key = key.clone();
            let value = value;
            async move { multimap.put(&key, &value).await.unwrap() }
        })
    });
    group.finish();

    runtime.block_on(multimap.close()).unwrap();
}

criterion_group!(benches, encoding_benchmark, relay_benchmark, multimap_benchmark);
criterion_main!(benches);
