//! Record codec and buffer benchmarks
//!
//! Run with: cargo bench --bench codec_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use replay_tracker::messages::{decode_stream, EventKind, EventRecord};
use replay_tracker::recording::MessageBuffer;
use replay_tracker::utils::config::BufferSettings;

fn click(i: u64) -> EventRecord {
    EventRecord::at(
        1_700_000_000_000 + i,
        EventKind::Click {
            label: format!("button-{}", i),
            x: 120.5,
            y: 480.25,
        },
    )
}

fn network_call(i: u64, body_size: usize) -> EventRecord {
    EventRecord::at(
        1_700_000_000_000 + i,
        EventKind::NetworkCall {
            kind: "xhr".into(),
            method: "POST".into(),
            url: format!("https://api.example.com/v1/items/{}", i),
            request: "x".repeat(body_size),
            response: "y".repeat(body_size),
            status: 200,
            duration: 42,
        },
    )
}

fn encoded_stream(records: &[EventRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        if let Ok(message) = record.encode() {
            out.extend_from_slice(message.as_bytes());
        }
    }
    out
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let record = click(1);
    group.bench_function("click", |b| b.iter(|| black_box(&record).encode()));

    for body_size in [64, 1024, 16 * 1024] {
        let record = network_call(1, body_size);
        group.throughput(Throughput::Bytes((body_size * 2) as u64));
        group.bench_with_input(
            BenchmarkId::new("network_call", body_size),
            &record,
            |b, record| b.iter(|| black_box(record).encode()),
        );
    }

    group.finish();
}

fn bench_decode_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_stream");

    for count in [100u64, 1_000] {
        let records: Vec<_> = (0..count).map(click).collect();
        let stream = encoded_stream(&records);
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("clicks", count), &stream, |b, stream| {
            b.iter(|| decode_stream(black_box(stream)))
        });
    }

    group.finish();
}

fn bench_buffer_cycle(c: &mut Criterion) {
    let records: Vec<_> = (0..1_000).map(click).collect();

    c.bench_function("buffer_append_drain_1000", |b| {
        b.iter(|| {
            let buffer = MessageBuffer::new(BufferSettings::default());
            for record in &records {
                let _ = buffer.append(record);
            }
            while let Some(batch) = buffer.drain(64 * 1024) {
                black_box(batch.encode().ok());
            }
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode_stream, bench_buffer_cycle);
criterion_main!(benches);
