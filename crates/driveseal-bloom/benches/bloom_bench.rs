use criterion::{black_box, criterion_group, criterion_main, Criterion};
use driveseal_bloom::{BitLayout, BloomFilter, DEFAULT_CAPACITY_HINT, DEFAULT_TARGET_RATE};

fn fingerprints(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("photos/2024/img_{:06}.jpg1718000000{}", i, 1024 + i))
        .collect()
}

fn bench_add(c: &mut Criterion) {
    let items = fingerprints(10_000);
    let mut filter =
        BloomFilter::new(DEFAULT_CAPACITY_HINT, DEFAULT_TARGET_RATE, BitLayout::Packed).unwrap();

    c.bench_function("bloom_add_10k", |b| {
        b.iter(|| {
            for item in &items {
                filter.add(black_box(item.as_bytes()));
            }
        })
    });
}

fn bench_check(c: &mut Criterion) {
    let items = fingerprints(10_000);
    let mut filter =
        BloomFilter::new(DEFAULT_CAPACITY_HINT, DEFAULT_TARGET_RATE, BitLayout::Packed).unwrap();
    for item in &items {
        filter.add(item.as_bytes());
    }

    c.bench_function("bloom_check_10k", |b| {
        b.iter(|| items.iter().all(|item| filter.check(black_box(item.as_bytes()))))
    });
}

criterion_group!(benches, bench_add, bench_check);
criterion_main!(benches);
