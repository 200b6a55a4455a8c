//! Codec benchmarks for ward-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use ward_protocol::{codec, Frame};

fn update_frame() -> Frame {
    Frame::dashboard_update(json!({"bedId": "7", "seriousness": 4}))
}

fn bench_encode(c: &mut Criterion) {
    let frame = update_frame();

    let mut group = c.benchmark_group("encode");
    group.bench_function("msgpack", |b| b.iter(|| codec::encode(black_box(&frame))));
    group.bench_function("json", |b| b.iter(|| codec::encode_text(black_box(&frame))));
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let frame = update_frame();
    let binary = codec::encode(&frame).unwrap();
    let text = codec::encode_text(&frame).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(binary.len() as u64));
    group.bench_function("msgpack", |b| b.iter(|| codec::decode(black_box(&binary))));
    group.bench_function("json", |b| b.iter(|| codec::decode_text(black_box(&text))));
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
