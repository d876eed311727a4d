//! Event pipeline - one producer thread, one consumer thread, one book.
//!
//! The producer publishes decoded events into the ring; the consumer
//! thread owns the matching engine exclusively and drains events in
//! arrival order, publishing trades and acks into caller-provided
//! sinks. The ring is the only object the two threads share.

use crate::event::{Ack, Event, SymbolTag, Trade};
use crate::matching::MatchingEngine;
use crate::ring::{ring, Consumer, Producer, PushError};

/// Anything that accepts emitted records. The recommended shape for
/// cross-thread egress is a second SPSC ring; tests collect into `Vec`.
pub trait Sink<T> {
    fn accept(&mut self, item: T);
}

impl<T> Sink<T> for Vec<T> {
    #[inline]
    fn accept(&mut self, item: T) {
        self.push(item);
    }
}

/// Best-effort egress into a downstream ring: a full ring drops the
/// record rather than stalling the matching loop.
impl<T> Sink<T> for Producer<T> {
    #[inline]
    fn accept(&mut self, item: T) {
        let _ = self.push(item);
    }
}

/// The write endpoint handed to the producer thread. Exactly one per
/// pipeline.
pub struct EventProducer {
    tx: Producer<Event>,
}

impl EventProducer {
    /// Attempt to enqueue an event. `Err` is backpressure, not failure;
    /// the producer chooses whether to spin, park, or drop.
    ///
    /// Nothing may be pushed after `Event::Shutdown`.
    #[inline]
    pub fn try_push(&mut self, event: Event) -> Result<(), PushError<Event>> {
        self.tx.push(event)
    }
}

/// Binds the ring to a consumer-owned matching engine.
pub struct Pipeline {
    rx: Consumer<Event>,
    tx: Option<Producer<Event>>,
    engine: MatchingEngine,
}

impl Pipeline {
    /// Create a pipeline with a ring of `ring_capacity` slots (power of
    /// two) and a node pool of `pool_capacity` cells.
    pub fn new(ring_capacity: usize, pool_capacity: u32, symbol_tag: SymbolTag) -> Self {
        let (tx, rx) = ring(ring_capacity);
        Self {
            rx,
            tx: Some(tx),
            engine: MatchingEngine::new(pool_capacity, symbol_tag),
        }
    }

    /// Take the single producer handle. Calling twice is a programming
    /// error and aborts.
    pub fn producer_handle(&mut self) -> EventProducer {
        let tx = self
            .tx
            .take()
            .expect("producer handle already taken; the ring is single-producer");
        EventProducer { tx }
    }

    /// The consumer-owned matching engine.
    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MatchingEngine {
        &mut self.engine
    }

    /// Pin the calling thread to the last available core, which is
    /// typically the one isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    /// Run the consumer loop on the calling thread.
    ///
    /// Drains the ring in arrival order, applying each event to the
    /// book and publishing outputs into the sinks. Returns once a
    /// `Shutdown` event is processed, after releasing every resting
    /// node back to the pool. Busy-waits on an empty ring.
    pub fn consumer_run(&mut self, trades: &mut impl Sink<Trade>, acks: &mut impl Sink<Ack>) {
        self.engine.warm_up();

        loop {
            while let Ok(event) = self.rx.pop() {
                if !self.apply(event, trades, acks) {
                    self.engine.tear_down();
                    return;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Apply one event to the book, publishing its outputs. Returns
    /// `false` when the event was `Shutdown`.
    ///
    /// Public for synchronous use in tests and benchmarks.
    pub fn apply(
        &mut self,
        event: Event,
        trades: &mut impl Sink<Trade>,
        acks: &mut impl Sink<Ack>,
    ) -> bool {
        match event {
            Event::NewOrder(order) => {
                let out = self.engine.submit(order);
                for trade in out.trades {
                    trades.accept(trade);
                }
                acks.accept(out.ack);
                true
            }
            Event::Cancel { order_id, ts_ns } => {
                acks.accept(self.engine.cancel(order_id, ts_ns));
                true
            }
            Event::Modify {
                order_id,
                new_qty,
                new_price,
                ts_ns,
            } => {
                let out = self.engine.modify(order_id, new_qty, new_price, ts_ns);
                for trade in out.trades {
                    trades.accept(trade);
                }
                for ack in out.acks {
                    acks.accept(ack);
                }
                true
            }
            Event::Shutdown => false,
        }
    }
}
