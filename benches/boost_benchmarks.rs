//! Performance benchmarks for hashing and the script codec

use boost_pow::{
    crypto::{hash256, Sha256dHasher},
    Address, Candidate, Digest256, InputScript, Job, OutputScript, Pubkey, Signature, Solution,
    Target,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

fn script() -> OutputScript {
    OutputScript::bounty(
        0,
        Digest256([0x42; 32]),
        Target::encode(0x1d, 0x00ffff),
        b"benchmark".to_vec(),
        7,
        vec![0x55; 64],
    )
}

fn bench_candidate_hash(c: &mut Criterion) {
    let job = Job::new(&script(), Address([0x11; 20]));
    let candidate = Candidate::new(&job.puzzle, &Solution::new(1_700_000_000, 0, 1, 2));

    c.bench_function("hash256_candidate", |b| {
        b.iter(|| black_box(candidate.hash()));
    });

    c.bench_function("hash256_80_bytes", |b| {
        let bytes = *candidate.as_bytes();
        b.iter(|| black_box(hash256(&bytes)));
    });
}

fn bench_nonce_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("nonce_search");
    // Nothing meets the hardest target, so every nonce is hashed.
    let script = OutputScript::bounty(0, Digest256([1; 32]), Target::HARD, Vec::new(), 0, Vec::new());
    let job = Job::new(&script, Address([0x22; 20]));

    for &count in &[1_000u64, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut hasher = Sha256dHasher::new();
                black_box(hasher.search(&job.puzzle, Solution::default(), count))
            });
        });
    }

    group.finish();
}

fn bench_script_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_codec");
    let output = script();
    let written = output.write();

    let mut key = vec![0x03];
    key.extend_from_slice(&[0x33; 32]);
    let input = InputScript::from_solution(
        Signature::new(vec![0x30; 72]),
        Pubkey::new(key),
        &Solution::new(1, 2, 3, 4),
        output.script_type,
    );
    let input_written = input.write();

    group.bench_function("write_output", |b| b.iter(|| black_box(output.write())));
    group.bench_function("read_output", |b| {
        b.iter(|| black_box(OutputScript::read(black_box(&written))))
    });
    group.bench_function("read_input", |b| {
        b.iter(|| black_box(InputScript::read(black_box(&input_written))))
    });
    group.bench_function("script_id", |b| b.iter(|| black_box(output.id())));

    group.finish();
}

criterion_group!(benches, bench_candidate_hash, bench_nonce_search, bench_script_codec);
criterion_main!(benches);
