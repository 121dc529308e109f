//! Word bank benchmarks for wordgame_core.
//!
//! Run with: `cargo bench -p wordgame_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wordgame_test_utils::fixtures::sample_bank;

/// Runs word bank benchmarks for the wordgame_core crate.
pub fn word_bank_benchmark(c: &mut Criterion) {
    let bank = sample_bank();
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    c.bench_function("random_sequence", |b| {
        b.iter(|| black_box(bank.random_sequence(&mut rng)))
    });

    c.bench_function("contains_mixed_case", |b| {
        b.iter(|| black_box(bank.contains(black_box("Scatter"))))
    });
}

criterion_group!(benches, word_bank_benchmark);
criterion_main!(benches);
