use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ordered_treap::treap::{RandomPriority, TreapMultiset};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::collections::BTreeMap;

const NUM_OF_OPERATIONS: usize = 100;

fn multiset() -> (TreapMultiset<u32>, Vec<u32>) {
    let mut rng = XorShiftRng::seed_from_u64(1);
    let values: Vec<u32> = (0..NUM_OF_OPERATIONS).map(|_| rng.gen_range(0..50)).collect();
    let multiset = TreapMultiset::with_priorities(RandomPriority::from_seed(1), values.clone());
    (multiset, values)
}

fn bench_btreemap_insert(c: &mut Criterion) {
    c.bench_function("bench btreemap counted insert", |b| {
        b.iter(|| {
            let mut rng = XorShiftRng::seed_from_u64(1);
            let mut map = BTreeMap::new();
            for _ in 0..NUM_OF_OPERATIONS {
                *map.entry(rng.gen_range(0..50u32)).or_insert(0usize) += 1;
            }
        })
    });
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("bench treap multiset insert", |b| {
        b.iter(|| {
            let mut rng = XorShiftRng::seed_from_u64(1);
            let priorities = RandomPriority::from_seed(1);
            let mut multiset = TreapMultiset::with_priorities(priorities, Vec::new());
            for _ in 0..NUM_OF_OPERATIONS {
                multiset.insert_right(rng.gen_range(0..50u32));
            }
        })
    });
}

fn bench_count(c: &mut Criterion) {
    let (multiset, values) = multiset();

    c.bench_function("bench treap multiset count", move |b| {
        b.iter(|| {
            for value in &values {
                black_box(multiset.count(value));
            }
        })
    });
}

fn bench_at(c: &mut Criterion) {
    let (multiset, _) = multiset();

    c.bench_function("bench treap multiset at", move |b| {
        b.iter(|| {
            for index in 0..NUM_OF_OPERATIONS {
                black_box(multiset.at(index as isize).map(|element| *element.value()));
            }
        })
    });
}

fn bench_split_merge(c: &mut Criterion) {
    let (multiset, values) = multiset();

    c.bench_function("bench treap multiset split and merge", move |b| {
        b.iter(|| {
            let mut multiset = multiset.clone();
            for value in &values {
                let (left, right) = multiset.split_before(value);
                multiset = left + right;
            }
            black_box(multiset.len())
        })
    });
}

criterion_group!(
    benches,
    bench_btreemap_insert,
    bench_insert,
    bench_count,
    bench_at,
    bench_split_merge,
);
criterion_main!(benches);
