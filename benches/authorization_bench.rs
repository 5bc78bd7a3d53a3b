//! Performance benchmarks for card authorization lookups.
//!
//! Every presented card is decided against the in-memory set before the
//! gate actuates, so lookup time is part of the tap-to-unlock latency.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench authorization_bench
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gatehouse_core::CardUid;
use gatehouse_storage::AuthorizationSet;
use std::hint::black_box;

fn uid(n: u32) -> CardUid {
    CardUid::from_bytes(&n.to_be_bytes()).unwrap()
}

fn card_file(size: u32) -> String {
    let entries: Vec<String> = (1..=size).map(|n| format!("\"{}\"", uid(n))).collect();
    format!("[{}]", entries.join(","))
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");

    for size in [10u32, 500, 5_000] {
        let set: AuthorizationSet = (1..=size).map(uid).collect();
        let known = uid(size / 2 + 1);
        let unknown = uid(size + 1);

        group.bench_with_input(BenchmarkId::new("granted", size), &known, |b, card| {
            b.iter(|| set.decide(black_box(card)))
        });
        group.bench_with_input(BenchmarkId::new("denied", size), &unknown, |b, card| {
            b.iter(|| set.decide(black_box(card)))
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_card_file");

    for size in [10u32, 500, 5_000] {
        let json = card_file(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &json, |b, json| {
            b.iter(|| AuthorizationSet::from_json_str(black_box(json)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decide, bench_load);
criterion_main!(benches);
