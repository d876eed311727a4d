//! Criterion latency benchmarks over the matching core.
//!
//! Measures:
//! - Submit (no match)
//! - Submit (full match) at varying passive depth
//! - Cancel at varying book size
//! - Multi-level sweeps
//! - Mixed workload

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulse_lob::{MatchingEngine, NewOrder, OrderType, Side};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn limit(client: u64, side: Side, price: u64, qty: u32) -> NewOrder {
    NewOrder {
        client_order_id: client,
        symbol_tag: 1,
        side,
        order_type: OrderType::Limit,
        price,
        qty,
        ts_ns: client,
    }
}

fn random_limit(rng: &mut ChaCha8Rng, client: u64) -> NewOrder {
    limit(
        client,
        if rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        },
        rng.gen_range(9_900..10_100) * 100,
        rng.gen_range(1..1_000),
    )
}

/// Submit an order that rests without matching.
fn bench_submit_no_match(c: &mut Criterion) {
    let mut engine = MatchingEngine::new(2_000_000, 1);
    engine.warm_up();

    let mut client = 0u64;

    c.bench_function("submit_no_match", |b| {
        b.iter(|| {
            client += 1;
            black_box(engine.submit(limit(client, Side::Buy, 9_000, 100)))
        })
    });
}

/// Submit an order that fully matches against pre-seeded depth.
fn bench_submit_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_full_match");

    for depth in [1usize, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let mut engine = MatchingEngine::new(2_000_000, 1);
            engine.warm_up();

            for i in 0..depth {
                engine.submit(limit(i as u64, Side::Sell, 10_000, 100));
            }

            let mut client = 1_000u64;

            b.iter(|| {
                client += 2;
                let out = engine.submit(limit(client, Side::Buy, 10_000, 100));

                // Replenish the consumed passive order.
                engine.submit(limit(client + 1, Side::Sell, 10_000, 100));

                black_box(out)
            })
        });
    }

    group.finish();
}

/// Cancel a resting order at varying book sizes.
fn bench_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel");

    for book_size in [100u64, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(book_size),
            book_size,
            |b, &book_size| {
                let mut engine = MatchingEngine::new(2_000_000, 1);
                engine.warm_up();

                for i in 0..book_size {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = if side == Side::Buy {
                        8_000 + (i % 100) * 10
                    } else {
                        12_000 + (i % 100) * 10
                    };
                    engine.submit(limit(i, side, price, 100));
                }

                let mut cancel_id = 1u64;
                let mut client = book_size;

                b.iter(|| {
                    let ack = engine.cancel(cancel_id, client);

                    // Replenish so the book size stays constant.
                    client += 1;
                    let side = if cancel_id % 2 == 1 { Side::Buy } else { Side::Sell };
                    let price = if side == Side::Buy {
                        8_000 + (cancel_id % 100) * 10
                    } else {
                        12_000 + (cancel_id % 100) * 10
                    };
                    let out = engine.submit(limit(client, side, price, 100));
                    cancel_id = out.order_id;

                    black_box(ack)
                })
            },
        );
    }

    group.finish();
}

/// Sweep across several passive levels in one submit.
fn bench_multi_level_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_level_sweep");

    for levels in [1u64, 5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(levels), levels, |b, &levels| {
            let mut engine = MatchingEngine::new(2_000_000, 1);
            engine.warm_up();

            let mut client = 0u64;

            b.iter(|| {
                // Seed one small order per level, then take them all.
                for i in 0..levels {
                    client += 1;
                    engine.submit(limit(client, Side::Sell, 10_000 + i * 10, 10));
                }
                client += 1;
                let out = engine.submit(limit(
                    client,
                    Side::Buy,
                    10_000 + levels * 10,
                    (levels * 10) as u32,
                ));
                black_box(out)
            })
        });
    }

    group.finish();
}

/// Realistic mixed flow: 70% submit, 30% cancel.
fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload");

    group.bench_function("70_submit_30_cancel", |b| {
        let mut engine = MatchingEngine::new(2_000_000, 1);
        engine.warm_up();

        let mut rng = ChaCha8Rng::seed_from_u64(0xDEADBEEF);
        let mut client = 0u64;
        let mut last_order_id = 1u64;

        for _ in 0..1_000 {
            client += 1;
            last_order_id = engine.submit(random_limit(&mut rng, client)).order_id.max(last_order_id);
        }

        b.iter(|| {
            if rng.gen_bool(0.7) {
                client += 1;
                let out = engine.submit(random_limit(&mut rng, client));
                last_order_id = out.order_id.max(last_order_id);
                black_box(out.trades.len())
            } else {
                let cancel_id = rng.gen_range(1..=last_order_id);
                black_box(engine.cancel(cancel_id, client)).remaining_qty as usize
            }
        })
    });

    group.finish();
}

/// Sustained throughput over batches of 1000 orders.
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1_000));

    group.bench_function("1000_orders", |b| {
        let mut engine = MatchingEngine::new(100_000, 1);
        engine.warm_up();

        let mut rng = ChaCha8Rng::seed_from_u64(0xCAFEBABE);

        b.iter(|| {
            for i in 0..1_000 {
                black_box(engine.submit(random_limit(&mut rng, i)));
            }
            engine.tear_down();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_no_match,
    bench_submit_full_match,
    bench_cancel,
    bench_multi_level_sweep,
    bench_mixed_workload,
    bench_throughput,
);

criterion_main!(benches);
