use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::PathBuf;
use voxturn::pipeline::playback::PlaybackQueue;
use voxturn::pipeline::reorder::ReorderBuffer;
use voxturn::pipeline::types::{AudioArtifact, Sequence, TurnId};

fn artifacts(turn: TurnId, order: &[Sequence]) -> Vec<AudioArtifact> {
    order
        .iter()
        .map(|&seq| AudioArtifact::speech(turn, seq, PathBuf::from(format!("response_{:03}.wav", seq))))
        .collect()
}

/// Completion orders a synthesis fan-out can produce.
fn orders(n: u32) -> Vec<(&'static str, Vec<Sequence>)> {
    let in_order: Vec<Sequence> = (1..=n).collect();
    let reversed: Vec<Sequence> = (1..=n).rev().collect();
    // Pairs swapped: 2,1,4,3,...
    let interleaved: Vec<Sequence> = (1..=n)
        .map(|i| if i % 2 == 1 { (i + 1).min(n) } else { i - 1 })
        .collect();
    vec![
        ("in_order", in_order),
        ("reversed", reversed),
        ("pairwise_swapped", interleaved),
    ]
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_submit");

    for n in [16u32, 256] {
        group.throughput(Throughput::Elements(u64::from(n)));
        for (name, order) in orders(n) {
            group.bench_with_input(BenchmarkId::new(name, n), &order, |b, order| {
                let queue = PlaybackQueue::new();
                let buffer = ReorderBuffer::new(queue.clone());
                b.iter(|| {
                    let turn = buffer.reset();
                    for artifact in artifacts(turn, order) {
                        black_box(buffer.submit(artifact));
                    }
                    black_box(queue.drain().len())
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_submit);
criterion_main!(benches);
