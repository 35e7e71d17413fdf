//! Sync engine and queue benchmarks.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use depthsync_bench::{Discard, FeedConfig, SyntheticFeed};
use depthsync_channel::spsc;
use depthsync_core::{DiffBatch, PairKey, Snapshot};
use depthsync_marketdata::{SyncEngineBuilder, SyncError};
use std::collections::VecDeque;
use std::hint::black_box;

fn benchmark_synced_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(1));

    group.bench_function("process_synced_batch", |b| {
        let mut feed = SyntheticFeed::new(FeedConfig::default());
        let first = feed.next_batch();
        let snapshot = Snapshot::new(first.first_id, Vec::new(), Vec::new());
        let mut pending = Some(snapshot);
        let fetcher = move |_: &PairKey, _: u32| -> Result<Snapshot, SyncError> {
            pending
                .take()
                .ok_or_else(|| SyncError::transport("only one snapshot"))
        };

        let (mut engine, _handle) = SyncEngineBuilder::new(PairKey::new("bench", "SYNTH")).build(
            VecDeque::<DiffBatch>::new(),
            fetcher,
            Discard::default(),
        );
        engine.process(first).unwrap();

        b.iter(|| {
            engine.process(black_box(feed.next_batch())).unwrap();
        })
    });

    group.finish();
}

fn benchmark_feed_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("feed_queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("spsc_send_recv_batch", |b| {
        let (mut tx, mut rx) = spsc::channel::<DiffBatch>(1024);
        let mut feed = SyntheticFeed::new(FeedConfig::default());
        let batch = feed.next_batch();

        b.iter(|| {
            tx.try_send(batch.clone()).unwrap();
            black_box(rx.try_recv().unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_synced_process, benchmark_feed_queue);
criterion_main!(benches);
