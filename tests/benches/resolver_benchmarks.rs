//! # Soltable Resolver Benchmarks
//!
//! | Operation | Target |
//! |-----------|--------|
//! | Table selection, 256 accounts over 100k records | < 1ms |
//! | Index insert | < 1µs per record |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::seq::SliceRandom;
use rand::Rng;
use soltable_index::{select_tables, Address, MembershipIndex, MembershipRecord};
use std::time::Duration;

fn random_address(rng: &mut impl Rng) -> Address {
    Address::new(rng.gen())
}

/// `tables` tables of `width` members drawn from a pool of `pool` accounts.
fn build_index(tables: usize, width: usize, pool: &[Address]) -> MembershipIndex {
    let mut rng = rand::thread_rng();
    let mut records = Vec::with_capacity(tables * width);
    for _ in 0..tables {
        let table = random_address(&mut rng);
        for account in pool.choose_multiple(&mut rng, width) {
            records.push(MembershipRecord::new(table, *account));
        }
    }
    MembershipIndex::from_records(records)
}

fn bench_select_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");
    group.measurement_time(Duration::from_secs(10));

    let mut rng = rand::thread_rng();
    let pool: Vec<Address> = (0..20_000).map(|_| random_address(&mut rng)).collect();
    let index = build_index(2_000, 50, &pool);

    for size in [16usize, 64, 256] {
        let query: Vec<Address> = pool.choose_multiple(&mut rng, size).copied().collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("select_tables", size), &query, |b, q| {
            b.iter(|| black_box(select_tables(&index, q)))
        });
    }
    group.finish();
}

fn bench_index_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("membership_index");

    let mut rng = rand::thread_rng();
    let records: Vec<MembershipRecord> = (0..10_000)
        .map(|_| MembershipRecord::new(random_address(&mut rng), random_address(&mut rng)))
        .collect();

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("insert_10k", |b| {
        b.iter(|| {
            let mut index = MembershipIndex::new();
            for record in &records {
                index.insert(*record);
            }
            black_box(index.len())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_select_tables, bench_index_insert);
criterion_main!(benches);
