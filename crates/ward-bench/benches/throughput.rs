//! Relay throughput benchmarks.
//!
//! Measures hub fan-out to many subscribers. Codec benchmarks live in
//! `ward-protocol`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ward_bench::payload;
use ward_core::{RegistryConfig, RelayHub};

/// Benchmark fan-out of one update to N subscribers.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for subscribers in [1usize, 10, 100, 1000] {
        let hub = RelayHub::with_config(RegistryConfig {
            max_subscribers: subscribers,
            queue_capacity: 1024,
        });
        let mut subscriptions: Vec<_> = (0..subscribers)
            .map(|_| hub.connect().unwrap())
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    let report = hub.ingest(None, black_box(payload(3, 2)));
                    // Keep queues from filling
                    for subscription in &mut subscriptions {
                        while subscription.try_recv().is_some() {}
                    }
                    report
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fanout);
criterion_main!(benches);
