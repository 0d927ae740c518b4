use std::hint::black_box;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use ff_partition::demo::placeholder_params;
use ff_partition::{FoldContext, ModelDetails};

/// A deterministic, non-repetitive filler sequence (no `rand` dependency
/// needed just to pick benchmark inputs).
fn random_like_sequence(n: usize) -> String {
    let bases = [b'A', b'C', b'G', b'U'];
    (0..n)
        .map(|i| bases[((i as u64).wrapping_mul(2654435761)) as usize % bases.len()] as char)
        .collect()
}

pub fn fill_by_length(c: &mut Criterion) {
    let params = placeholder_params();
    let mut group = c.benchmark_group("ForwardEngine fill");
    for &n in &[20usize, 60, 120] {
        let seq = random_like_sequence(n);
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| {
                let ctx = FoldContext::new(&seq, &params, ModelDetails::default()).unwrap();
                black_box(ctx.partition_function().unwrap());
            });
        });
    }
}

pub fn circular_fill(c: &mut Criterion) {
    let params = placeholder_params();
    let mut model = ModelDetails::default();
    model.circ = true;
    let seq = random_like_sequence(60);

    c.bench_function("ForwardEngine fill, circular, n=60", |b| {
        b.iter(|| {
            let ctx = FoldContext::new(&seq, &params, model.clone()).unwrap();
            black_box(ctx.partition_function().unwrap());
        });
    });
}

criterion_group!(benches, fill_by_length, circular_fill);
criterion_main!(benches);
