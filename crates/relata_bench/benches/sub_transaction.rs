//! Sub-transaction benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relata_bench::utils::{load_orders, seeded_environment};

/// Benchmark creating and discarding an empty sub-transaction.
fn bench_create_discard(c: &mut Criterion) {
    c.bench_function("sub_transaction_create_discard", |b| {
        let (env, _) = seeded_environment(0, 0);
        let tx = env.transaction();

        b.iter(|| {
            let sub = tx.create_sub_transaction().unwrap();
            sub.discard().unwrap();
            black_box(sub);
        });
    });
}

/// Benchmark a full round trip: load through the parent, change, commit
/// into the parent, discard.
fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("sub_transaction_round_trip");

    for count in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (env, seeded) = seeded_environment(count, 2);
            let tx = env.transaction();
            let orders = load_orders(&tx, &seeded);
            let mut round = 0i64;

            b.iter(|| {
                round += 1;
                let sub = tx.create_sub_transaction().unwrap();
                for order in &orders {
                    sub.set_value(order, "OrderNumber", round).unwrap();
                }
                sub.commit().unwrap();
                sub.discard().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark moving items between orders inside a sub-transaction.
fn bench_relation_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("sub_transaction_relation_merge");

    for items in [10, 100].iter() {
        group.throughput(Throughput::Elements(*items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), items, |b, &items| {
            let (env, seeded) = seeded_environment(2, items);
            let tx = env.transaction();
            let orders = load_orders(&tx, &seeded);
            let mut target = 1;

            b.iter(|| {
                let sub = tx.create_sub_transaction().unwrap();
                let source = sub.related_objects(&orders[1 - target], "OrderItems").unwrap();
                for item in source.to_vec().unwrap() {
                    sub.set_related(&item, "Order", Some(&orders[target])).unwrap();
                }
                sub.commit().unwrap();
                sub.discard().unwrap();
                target = 1 - target;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create_discard, bench_round_trip, bench_relation_merge);

criterion_main!(benches);
