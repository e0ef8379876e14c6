use criterion::{Criterion, criterion_group, criterion_main};
use relaylog::relay::{DEFAULT_HISTORY_SIZE, HistoryRing, LineBuffer};
use std::hint::black_box;

const LINE: &str = r#"{"timeMs":1710072000000,"host":"box","context":"master.db","level":"info","log":"query ok"}"#;

fn full_ring() -> HistoryRing {
    let mut ring = HistoryRing::new(DEFAULT_HISTORY_SIZE);
    for _ in 0..DEFAULT_HISTORY_SIZE {
        ring.push(LINE);
    }
    ring
}

fn bench_history_push(c: &mut Criterion) {
    let mut ring = full_ring();

    c.bench_function("HistoryRing::push (full)", |b| {
        b.iter(|| ring.push(black_box(LINE)));
    });
}

fn bench_history_replay(c: &mut Criterion) {
    let ring = full_ring();

    c.bench_function("HistoryRing::replay_chunks", |b| {
        b.iter(|| ring.replay_chunks(black_box(32)));
    });
}

fn bench_line_buffer(c: &mut Criterion) {
    let block: String = std::iter::repeat_n(format!("{LINE}\n"), 16).collect();
    let (head, tail) = block.as_bytes().split_at(block.len() / 2 + 3);

    c.bench_function("LineBuffer::push (split block)", |b| {
        b.iter(|| {
            let mut buffer = LineBuffer::new();
            assert!(buffer.push(black_box(head)).is_none());
            buffer.push(black_box(tail))
        });
    });
}

criterion_group!(
    benches,
    bench_history_push,
    bench_history_replay,
    bench_line_buffer,
);
criterion_main!(benches);
