//! Matching core - admission, price-time matching, cancel and modify.
//!
//! The cross/rest split: an incoming order first matches against the
//! opposite ladder (best level, oldest order first), then the residual
//! is disposed of according to its order type. Trades always price at
//! the passive side.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::book::OrderBook;
use crate::event::{
    Ack, AckKind, ExecId, NewOrder, OrderId, OrderType, Price, Qty, RejectReason, Side, SymbolTag,
    Trade, TsNanos, PRICE_MAX_SENTINEL, PRICE_MIN_SENTINEL,
};
use crate::pool::NodePool;

/// Result of submitting a new order.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Book-assigned id; 0 when the order was rejected at admission.
    pub order_id: OrderId,
    /// Executions in match order.
    pub trades: Vec<Trade>,
    pub ack: Ack,
}

/// Result of a modify: zero or more trades (a replacement may cross)
/// and one or two acks (`[Modified]`, `[Rejected]`, or
/// `[Cancelled, <replacement ack>]`).
#[derive(Debug)]
pub struct ModifyOutcome {
    pub trades: Vec<Trade>,
    pub acks: Vec<Ack>,
}

/// Single-symbol matching engine: pool + book + id counters.
///
/// Owned exclusively by the consumer thread.
pub struct MatchingEngine {
    pub pool: NodePool,
    pub book: OrderBook,
    symbol_tag: SymbolTag,
    next_order_id: OrderId,
    next_exec_id: ExecId,
    next_arrival_seq: u64,
}

impl MatchingEngine {
    /// Create an engine whose pool holds at most `pool_capacity`
    /// resting orders.
    pub fn new(pool_capacity: u32, symbol_tag: SymbolTag) -> Self {
        Self {
            pool: NodePool::new(pool_capacity),
            book: OrderBook::with_capacity(1024, pool_capacity as usize),
            symbol_tag,
            next_order_id: 1,
            next_exec_id: 1,
            next_arrival_seq: 1,
        }
    }

    #[inline]
    pub fn symbol_tag(&self) -> SymbolTag {
        self.symbol_tag
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Admit a new order: validate, match, then rest or discard the
    /// residual per order type.
    ///
    /// Validation happens before any id is assigned, so a rejected
    /// event leaves every counter and every book structure untouched.
    pub fn submit(&mut self, order: NewOrder) -> SubmitOutcome {
        let ts = order.ts_ns;

        if order.qty == 0 {
            return Self::rejected_submit(RejectReason::InvalidQuantity, &order, ts);
        }

        // Market orders ignore their price field and peg to the most
        // aggressive representable tick for their side. Everything else
        // must carry a price strictly inside the sentinels.
        let limit_price = match order.order_type {
            OrderType::Market => match order.side {
                Side::Buy => PRICE_MAX_SENTINEL,
                Side::Sell => PRICE_MIN_SENTINEL,
            },
            _ => {
                if order.price == PRICE_MIN_SENTINEL || order.price == PRICE_MAX_SENTINEL {
                    return Self::rejected_submit(RejectReason::InvalidPrice, &order, ts);
                }
                order.price
            }
        };

        // Fill-or-kill: inspect the opposite ladder without mutating;
        // reject unless the full quantity is crossable.
        if order.order_type == OrderType::FillOrKill
            && self.book.crossable_qty(order.side, limit_price) < order.qty as u64
        {
            return Self::rejected_submit(RejectReason::FillOrKillUnfillable, &order, ts);
        }

        // Only limit orders can rest; reject them up front when no cell
        // is free so a rejection never follows a partial fill.
        if order.order_type == OrderType::Limit && self.pool.is_full() {
            return Self::rejected_submit(RejectReason::PoolExhausted, &order, ts);
        }

        let order_id = self.next_order_id;
        self.next_order_id += 1;
        let arrival_seq = self.next_arrival_seq;
        self.next_arrival_seq += 1;

        let mut trades = Vec::new();
        let remaining = self.cross(order.side, limit_price, order.qty, order_id, ts, &mut trades);

        let ack = match order.order_type {
            OrderType::Limit => {
                if remaining == 0 {
                    Ack {
                        kind: AckKind::Filled,
                        order_id,
                        client_order_id: order.client_order_id,
                        remaining_qty: 0,
                        ts_ns: ts,
                    }
                } else {
                    match self.rest(&order, order_id, arrival_seq, remaining) {
                        Some(()) => Ack {
                            kind: if trades.is_empty() {
                                AckKind::Accepted
                            } else {
                                AckKind::PartiallyFilled
                            },
                            order_id,
                            client_order_id: order.client_order_id,
                            remaining_qty: remaining,
                            ts_ns: ts,
                        },
                        // Unreachable after the admission check (matching
                        // only frees cells); kept as the failure surface
                        // of the acquire contract.
                        None => Ack::rejected(
                            RejectReason::PoolExhausted,
                            order_id,
                            order.client_order_id,
                            remaining,
                            ts,
                        ),
                    }
                }
            }
            OrderType::Market | OrderType::ImmediateOrCancel => {
                if remaining == 0 {
                    Ack {
                        kind: AckKind::Filled,
                        order_id,
                        client_order_id: order.client_order_id,
                        remaining_qty: 0,
                        ts_ns: ts,
                    }
                } else {
                    // Residual never rests; report it cancelled.
                    Ack {
                        kind: AckKind::Cancelled,
                        order_id,
                        client_order_id: order.client_order_id,
                        remaining_qty: remaining,
                        ts_ns: ts,
                    }
                }
            }
            OrderType::FillOrKill => {
                debug_assert_eq!(remaining, 0, "FOK residual after positive precheck");
                Ack {
                    kind: AckKind::Filled,
                    order_id,
                    client_order_id: order.client_order_id,
                    remaining_qty: remaining,
                    ts_ns: ts,
                }
            }
        };

        SubmitOutcome {
            order_id,
            trades,
            ack,
        }
    }

    fn rejected_submit(reason: RejectReason, order: &NewOrder, ts: TsNanos) -> SubmitOutcome {
        SubmitOutcome {
            order_id: 0,
            trades: Vec::new(),
            ack: Ack::rejected(reason, 0, order.client_order_id, order.qty, ts),
        }
    }

    /// Whether an aggressor at `limit` crosses the opposite best.
    #[inline]
    fn crossable(side: Side, limit: Price, opposite_best: Price) -> bool {
        match side {
            Side::Buy => limit >= opposite_best,
            Side::Sell => limit <= opposite_best,
        }
    }

    /// Match an aggressive order against the opposite ladder, best
    /// level first, oldest order first within a level.
    ///
    /// Returns the unmatched residual.
    fn cross(
        &mut self,
        aggr_side: Side,
        limit: Price,
        mut remaining: Qty,
        aggr_id: OrderId,
        ts: TsNanos,
        trades: &mut Vec<Trade>,
    ) -> Qty {
        loop {
            if remaining == 0 {
                break;
            }

            let best = match self.book.best_opposite_price(aggr_side) {
                Some(price) => price,
                None => break,
            };

            if !Self::crossable(aggr_side, limit, best) {
                break;
            }

            remaining = self.match_at_level(aggr_side, best, remaining, aggr_id, ts, trades);
        }

        remaining
    }

    /// Consume orders at one passive level until the aggressor or the
    /// level is exhausted.
    fn match_at_level(
        &mut self,
        aggr_side: Side,
        price: Price,
        mut remaining: Qty,
        aggr_id: OrderId,
        ts: TsNanos,
        trades: &mut Vec<Trade>,
    ) -> Qty {
        let passive_side = aggr_side.opposite();

        loop {
            if remaining == 0 {
                break;
            }

            let front = match self.book.get_level(passive_side, price) {
                Some(level) if !level.is_empty() => level.front(),
                _ => break,
            };

            let passive = self.pool.get(front);
            let passive_id = passive.order_id;
            let passive_qty = passive.remaining_qty;

            let fill = remaining.min(passive_qty);

            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;

            let (buy_order_id, sell_order_id) = match aggr_side {
                Side::Buy => (aggr_id, passive_id),
                Side::Sell => (passive_id, aggr_id),
            };

            trades.push(Trade {
                exec_id,
                symbol_tag: self.symbol_tag,
                aggressor_side: aggr_side,
                buy_order_id,
                sell_order_id,
                price,
                qty: fill,
                ts_ns: ts,
            });
            self.book.record_trade(price, fill);

            remaining -= fill;

            if fill == passive_qty {
                // Passive fully consumed: unlink, erase, release.
                let emptied = {
                    let level = self
                        .book
                        .get_level_mut(passive_side, price)
                        .expect("level present during match");
                    level.pop_front(&mut self.pool);
                    level.is_empty()
                };
                self.book.erase_directory(passive_id);
                self.pool.release(front);
                if emptied {
                    self.book.remove_empty_level(passive_side, price);
                    break;
                }
            } else {
                // Aggressor exhausted against the level head.
                let level = self
                    .book
                    .get_level_mut(passive_side, price)
                    .expect("level present during match");
                level.reduce_front(&mut self.pool, fill);
                debug_assert_eq!(remaining, 0);
            }
        }

        remaining
    }

    /// Book the residual of a limit order at its limit price.
    fn rest(
        &mut self,
        order: &NewOrder,
        order_id: OrderId,
        arrival_seq: u64,
        remaining: Qty,
    ) -> Option<()> {
        let handle = self.pool.acquire()?;

        let node = self.pool.get_mut(handle);
        node.order_id = order_id;
        node.client_order_id = order.client_order_id;
        node.side = order.side;
        node.order_type = OrderType::Limit;
        node.price = order.price;
        node.remaining_qty = remaining;
        node.original_qty = order.qty;
        node.arrival_seq = arrival_seq;
        node.arrival_ts = order.ts_ns;

        self.book
            .insert_order(&mut self.pool, order_id, order.side, order.price, handle);

        Some(())
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    /// Remove a resting order. Unknown or already-terminal ids reject.
    pub fn cancel(&mut self, order_id: OrderId, ts: TsNanos) -> Ack {
        match self.book.remove_order(&mut self.pool, order_id) {
            Some(entry) => {
                let node = self.pool.get(entry.handle);
                let client_order_id = node.client_order_id;
                let remaining_qty = node.remaining_qty;
                self.pool.release(entry.handle);

                Ack {
                    kind: AckKind::Cancelled,
                    order_id,
                    client_order_id,
                    remaining_qty,
                    ts_ns: ts,
                }
            }
            None => Ack::rejected(RejectReason::UnknownOrder, order_id, 0, 0, ts),
        }
    }

    // ========================================================================
    // Modify
    // ========================================================================

    /// Amend a resting order.
    ///
    /// A pure quantity reduction at the same price edits in place and
    /// keeps queue priority. Anything else (price change or quantity
    /// increase) is cancel-and-replace: the order loses priority and
    /// the replacement may cross immediately.
    pub fn modify(
        &mut self,
        order_id: OrderId,
        new_qty: Qty,
        new_price: Price,
        ts: TsNanos,
    ) -> ModifyOutcome {
        let entry = match self.book.get_ref(order_id) {
            Some(entry) => *entry,
            None => {
                return ModifyOutcome {
                    trades: Vec::new(),
                    acks: vec![Ack::rejected(RejectReason::UnknownOrder, order_id, 0, 0, ts)],
                }
            }
        };

        let node = self.pool.get(entry.handle);
        let client_order_id = node.client_order_id;
        let remaining = node.remaining_qty;

        if new_qty == 0 {
            return ModifyOutcome {
                trades: Vec::new(),
                acks: vec![Ack::rejected(
                    RejectReason::InvalidQuantity,
                    order_id,
                    client_order_id,
                    remaining,
                    ts,
                )],
            };
        }

        if new_price == PRICE_MIN_SENTINEL || new_price == PRICE_MAX_SENTINEL {
            return ModifyOutcome {
                trades: Vec::new(),
                acks: vec![Ack::rejected(
                    RejectReason::InvalidPrice,
                    order_id,
                    client_order_id,
                    remaining,
                    ts,
                )],
            };
        }

        if new_price == entry.price && new_qty <= remaining {
            // In-place reduction: priority kept.
            let delta = (remaining - new_qty) as u64;
            self.pool.get_mut(entry.handle).remaining_qty = new_qty;
            self.book
                .get_level_mut(entry.side, entry.price)
                .expect("resting order has a level")
                .subtract_qty(delta);

            return ModifyOutcome {
                trades: Vec::new(),
                acks: vec![Ack {
                    kind: AckKind::Modified,
                    order_id,
                    client_order_id,
                    remaining_qty: new_qty,
                    ts_ns: ts,
                }],
            };
        }

        // Cancel-and-replace: fresh id, fresh sequence, new priority.
        let cancel_ack = self.cancel(order_id, ts);
        debug_assert_eq!(cancel_ack.kind, AckKind::Cancelled);

        let outcome = self.submit(NewOrder {
            client_order_id,
            symbol_tag: self.symbol_tag,
            side: entry.side,
            order_type: OrderType::Limit,
            price: new_price,
            qty: new_qty,
            ts_ns: ts,
        });

        ModifyOutcome {
            trades: outcome.trades,
            acks: vec![cancel_ack, outcome.ack],
        }
    }

    // ========================================================================
    // Support
    // ========================================================================

    /// Pre-fault pool pages before entering the hot loop.
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
    }

    /// Fingerprint of the current book state, for replay verification.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.book.best_bid().hash(&mut hasher);
        self.book.best_ask().hash(&mut hasher);
        self.book.order_count().hash(&mut hasher);
        self.pool.live().hash(&mut hasher);
        self.book.traded_volume().hash(&mut hasher);
        self.book.trade_count().hash(&mut hasher);
        self.next_order_id.hash(&mut hasher);
        self.next_exec_id.hash(&mut hasher);

        hasher.finish()
    }

    /// Release every resting node and clear the book. Used at shutdown.
    pub fn tear_down(&mut self) {
        self.book.release_all(&mut self.pool);
    }

    /// Structural consistency sweep (test support).
    pub fn audit(&self) {
        self.book.audit(&self.pool);
    }
}
