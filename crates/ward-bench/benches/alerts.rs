//! Alert state machine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ward_bench::oscillating_readings;
use ward_core::{AlertBook, BedId, Seriousness};

/// Benchmark a single bed bouncing in and out of emergency.
fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe");
    let bed = BedId::from("7");
    let levels: Vec<_> = [2u8, 3, 4, 4, 3, 4]
        .into_iter()
        .filter_map(Seriousness::new)
        .collect();

    group.throughput(Throughput::Elements(levels.len() as u64));
    group.bench_function("single_bed", |b| {
        let mut book = AlertBook::new();
        book.enable_alerts();
        b.iter(|| {
            for &level in &levels {
                black_box(book.observe(&bed, Some(level)));
            }
        });
    });

    group.finish();
}

/// Benchmark raw payload handling across many beds.
fn bench_observe_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_payload");

    for beds in [10u32, 100, 1000] {
        let readings = oscillating_readings(beds, 10_000);
        group.throughput(Throughput::Elements(readings.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(beds), &readings, |b, readings| {
            let mut book = AlertBook::new();
            book.enable_alerts();
            b.iter(|| {
                let mut alarms = 0usize;
                for payload in readings {
                    if book.observe_payload(payload).is_some_and(|t| t.alarm) {
                        alarms += 1;
                    }
                }
                alarms
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_observe, bench_observe_payload);
criterion_main!(benches);
