use hdrhistogram::Histogram;
use pulse_lob::{Event, NewOrder, OrderType, Pipeline, Side};
use std::time::Instant;

fn main() {
    println!("Preparing latency benchmark...");

    let mut pipeline = Pipeline::new(65_536, 200_000, 1);
    pipeline.engine_mut().warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3).unwrap();

    const ITERATIONS: u64 = 1_000_000;
    const BUFFER_SIZE: usize = 10_000;

    // Pre-generate events to keep RNG and allocation out of the
    // measured section.
    println!("Pre-generating {} events...", BUFFER_SIZE);
    let mut events = Vec::with_capacity(BUFFER_SIZE);
    for i in 0..BUFFER_SIZE {
        let client = (i + 1) as u64;
        events.push(Event::NewOrder(NewOrder {
            client_order_id: client,
            symbol_tag: 1,
            side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
            order_type: OrderType::Limit,
            price: 10_000 + (client % 100),
            qty: 10,
            ts_ns: client,
        }));
    }

    let mut trades = Vec::new();
    let mut acks = Vec::new();

    // Execution warm-up: train the branch predictor and fault in the
    // ladders before measuring.
    println!("Warming up ({} ops)...", BUFFER_SIZE);
    for event in events.iter() {
        std::hint::black_box(pipeline.apply(*event, &mut trades, &mut acks));
    }
    trades.clear();
    acks.clear();

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = std::time::Duration::new(0, 0);
    let mut event_cycle = events.into_iter().cycle();

    for _ in 0..ITERATIONS {
        let event = event_cycle.next().unwrap();

        let start = Instant::now();
        std::hint::black_box(pipeline.apply(event, &mut trades, &mut acks));
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;

        // Keep the output buffers from growing without bound.
        trades.clear();
        acks.clear();
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!(
        "Throughput: {:.2} ops/sec",
        ITERATIONS as f64 / total_duration.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100_000, 2.0) {
        let count = v.count_at_value();
        if count > 0 {
            println!(
                "{:6} ns: {:10} count",
                v.value_iterated_to(),
                count
            );
        }
    }
}
