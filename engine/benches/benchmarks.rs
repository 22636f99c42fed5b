//! Performance benchmarks for trailsync-engine

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trailsync_engine::{
    queue::replay_order, ConnectivityMonitor, EntityId, Location, MemoryRemote, MemoryStore,
    Mutation, ObservationFields, PendingSyncItem, ReconciliationMap, SyncConfig, SyncEngine,
    WalkFields, WalkPatch,
};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
}

/// A queue of `size` entries with walks and observations interleaved, each
/// observation belonging to the walk queued just before it.
fn mixed_queue(size: usize) -> Vec<PendingSyncItem> {
    (0..size)
        .map(|i| {
            let seq = i as u64 + 1;
            if i % 2 == 0 {
                PendingSyncItem::new(
                    seq,
                    EntityId::provisional(format!("tmp_w{i}")),
                    Mutation::WalkCreate {
                        walk: WalkFields::new("ana", format!("Walk {i}"), at(0)),
                    },
                    at((size - i) as i64),
                )
            } else {
                PendingSyncItem::new(
                    seq,
                    EntityId::provisional(format!("tmp_o{i}")),
                    Mutation::ObservationCreate {
                        walk_id: EntityId::provisional(format!("tmp_w{}", i - 1)),
                        observation: ObservationFields::new(
                            "ana",
                            "Blackbird",
                            "bird",
                            Location::new(51.5, -0.1),
                            at(i as i64),
                        ),
                    },
                    at((size - i) as i64),
                )
            }
        })
        .collect()
}

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");

    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("replay_order", size), size, |b, &size| {
            let queue = mixed_queue(size);
            b.iter(|| replay_order(black_box(queue.clone())))
        });
    }

    group.finish();
}

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("rewrite_pending", size), size, |b, &size| {
            let queue = mixed_queue(size);
            let map = ReconciliationMap::from_created(
                (0..size)
                    .step_by(2)
                    .map(|i| (format!("tmp_w{i}"), format!("w_{i}"))),
            );

            b.iter(|| {
                let mut queue = queue.clone();
                let mut rewritten = 0usize;
                for item in queue.iter_mut() {
                    if map.rewrite_pending(black_box(item)) {
                        rewritten += 1;
                    }
                }
                rewritten
            })
        });
    }

    group.finish();
}

fn bench_sync_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_pass");
    group.sample_size(20);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("drain_queue", size), size, |b, &size| {
            b.iter(|| {
                let engine = SyncEngine::new(
                    MemoryStore::new(),
                    MemoryRemote::new(),
                    ConnectivityMonitor::new(true),
                    SyncConfig::default(),
                )
                .unwrap();
                for i in 0..size {
                    let walk = engine
                        .enqueue_walk_create(WalkFields::new("ana", format!("Walk {i}"), at(0)))
                        .unwrap();
                    engine
                        .enqueue_walk_update(&walk, WalkPatch::complete(at(600), None, 1_200.0))
                        .unwrap();
                }
                runtime.block_on(engine.run_sync_pass()).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    let queue = mixed_queue(2);
    let item = &queue[1];

    group.bench_function("queue_item_to_json", |b| {
        b.iter(|| serde_json::to_string(black_box(item)))
    });

    group.bench_function("queue_item_from_json", |b| {
        let json = serde_json::to_string(item).unwrap();
        b.iter(|| serde_json::from_str::<PendingSyncItem>(black_box(&json)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_queue,
    bench_reconciliation,
    bench_sync_pass,
    bench_serialization,
);
criterion_main!(benches);
