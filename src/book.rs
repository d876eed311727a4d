//! Order book state - dual-sided price ladder, order directory,
//! cached best prices, and cumulative trade statistics.
//!
//! Sparse ladders over `FxHashMap` keep O(1) level access for
//! arbitrary price ranges; best prices are cached explicitly and
//! recalculated only when the best level empties.

use rustc_hash::FxHashMap;

use crate::event::{OrderId, Price, Qty, Side};
use crate::level::PriceLevel;
use crate::pool::{NodeHandle, NodePool};

/// Directory entry: where an order currently rests.
#[derive(Clone, Copy, Debug)]
pub struct OrderRef {
    pub handle: NodeHandle,
    pub side: Side,
    pub price: Price,
}

/// One level of a depth snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelView {
    pub price: Price,
    pub total_qty: u64,
    pub order_count: u32,
}

/// Single-symbol book state. All access is from the consumer thread.
pub struct OrderBook {
    /// Bid levels, best = highest price.
    bids: FxHashMap<Price, PriceLevel>,
    /// Ask levels, best = lowest price.
    asks: FxHashMap<Price, PriceLevel>,
    /// Cached best bid.
    best_bid: Option<Price>,
    /// Cached best ask.
    best_ask: Option<Price>,
    /// OrderId -> resting location, for O(1) cancel/modify.
    directory: FxHashMap<OrderId, OrderRef>,

    // Cumulative execution statistics.
    total_volume: u64,
    trade_count: u64,
    total_notional: u128,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_capacity(1024, 4096)
    }

    /// Pre-size the ladders and directory to avoid rehashing mid-run.
    pub fn with_capacity(levels: usize, orders: usize) -> Self {
        Self {
            bids: FxHashMap::with_capacity_and_hasher(levels, Default::default()),
            asks: FxHashMap::with_capacity_and_hasher(levels, Default::default()),
            best_bid: None,
            best_ask: None,
            directory: FxHashMap::with_capacity_and_hasher(orders, Default::default()),
            total_volume: 0,
            trade_count: 0,
            total_notional: 0,
        }
    }

    // ========================================================================
    // Best prices
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    #[inline]
    pub fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        }
    }

    /// Best price on the side an aggressor of `side` would match against.
    #[inline]
    pub fn best_opposite_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.best_ask,
            Side::Sell => self.best_bid,
        }
    }

    /// `best_ask - best_bid`, when both sides are populated.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the touch, rounded down to a tick.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(bid / 2 + ask / 2 + (bid & ask & 1)),
            _ => None,
        }
    }

    // ========================================================================
    // Level access
    // ========================================================================

    #[inline]
    pub fn get_level(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        }
    }

    #[inline]
    pub fn get_level_mut(&mut self, side: Side, price: Price) -> Option<&mut PriceLevel> {
        match side {
            Side::Buy => self.bids.get_mut(&price),
            Side::Sell => self.asks.get_mut(&price),
        }
    }

    #[inline]
    fn get_or_create_level(&mut self, side: Side, price: Price) -> &mut PriceLevel {
        match side {
            Side::Buy => self.bids.entry(price).or_insert_with(PriceLevel::new),
            Side::Sell => self.asks.entry(price).or_insert_with(PriceLevel::new),
        }
    }

    /// Total quantity fillable at prices crossable by an aggressor of
    /// `side` with limit `limit_price`. Pure inspection, used by the
    /// fill-or-kill precheck. Saturates at `u64::MAX`.
    pub fn crossable_qty(&self, side: Side, limit_price: Price) -> u64 {
        let levels = match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };
        levels
            .iter()
            .filter(|(&price, _)| match side {
                Side::Buy => price <= limit_price,
                Side::Sell => price >= limit_price,
            })
            .fold(0u64, |acc, (_, level)| acc.saturating_add(level.total_qty))
    }

    // ========================================================================
    // Order management
    // ========================================================================

    /// Link an already-initialised node into its price level and the
    /// directory. The caller guarantees the book-assigned id is fresh.
    pub fn insert_order(
        &mut self,
        pool: &mut NodePool,
        order_id: OrderId,
        side: Side,
        price: Price,
        handle: NodeHandle,
    ) {
        debug_assert!(
            !self.directory.contains_key(&order_id),
            "book-assigned ids are unique"
        );

        self.directory.insert(
            order_id,
            OrderRef {
                handle,
                side,
                price,
            },
        );

        let level = self.get_or_create_level(side, price);
        level.push_back(pool, handle);

        self.raise_best_on_insert(side, price);
    }

    /// Unlink an order for cancellation. Returns its directory entry,
    /// or `None` when the id is unknown. The node is not released.
    pub fn remove_order(&mut self, pool: &mut NodePool, order_id: OrderId) -> Option<OrderRef> {
        let entry = self.directory.remove(&order_id)?;

        let level = match entry.side {
            Side::Buy => self.bids.get_mut(&entry.price),
            Side::Sell => self.asks.get_mut(&entry.price),
        };

        if let Some(level) = level {
            let emptied = level.remove(pool, entry.handle);
            if emptied {
                self.remove_empty_level(entry.side, entry.price);
            }
        }

        Some(entry)
    }

    /// Directory lookup.
    #[inline]
    pub fn get_ref(&self, order_id: OrderId) -> Option<&OrderRef> {
        self.directory.get(&order_id)
    }

    #[inline]
    pub fn contains_order(&self, order_id: OrderId) -> bool {
        self.directory.contains_key(&order_id)
    }

    /// Drop a directory entry whose node was consumed by matching.
    #[inline]
    pub fn erase_directory(&mut self, order_id: OrderId) {
        self.directory.remove(&order_id);
    }

    /// Remove an empty level and refresh the cached best if it was the
    /// touch.
    pub fn remove_empty_level(&mut self, side: Side, price: Price) {
        match side {
            Side::Buy => {
                self.bids.remove(&price);
                if self.best_bid == Some(price) {
                    self.best_bid = self.bids.keys().copied().max();
                }
            }
            Side::Sell => {
                self.asks.remove(&price);
                if self.best_ask == Some(price) {
                    self.best_ask = self.asks.keys().copied().min();
                }
            }
        }
    }

    fn raise_best_on_insert(&mut self, side: Side, price: Price) {
        match side {
            Side::Buy => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Sell => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Fold one execution into the cumulative totals.
    #[inline]
    pub fn record_trade(&mut self, price: Price, qty: Qty) {
        self.total_volume += qty as u64;
        self.trade_count += 1;
        self.total_notional += price as u128 * qty as u128;
    }

    /// Cumulative traded quantity.
    #[inline]
    pub fn traded_volume(&self) -> u64 {
        self.total_volume
    }

    /// Number of executions so far.
    #[inline]
    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    /// Volume-weighted average execution price, computed on demand from
    /// the running `(notional, volume)` pair so no rounding error
    /// accumulates. `None` before the first trade.
    pub fn avg_trade_price(&self) -> Option<Price> {
        if self.total_volume == 0 {
            return None;
        }
        Some((self.total_notional / self.total_volume as u128) as Price)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.directory.len()
    }

    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// `(total_qty, order_count)` resting at one price.
    pub fn depth_at(&self, side: Side, price: Price) -> (u64, u32) {
        self.get_level(side, price)
            .map(|l| (l.total_qty, l.order_count))
            .unwrap_or((0, 0))
    }

    /// Top `depth` bid levels in priority order (descending price).
    pub fn bid_depth(&self, depth: usize) -> Vec<LevelView> {
        let mut views: Vec<LevelView> = self
            .bids
            .iter()
            .map(|(&price, level)| LevelView {
                price,
                total_qty: level.total_qty,
                order_count: level.order_count,
            })
            .collect();
        views.sort_by(|a, b| b.price.cmp(&a.price));
        views.truncate(depth);
        views
    }

    /// Top `depth` ask levels in priority order (ascending price).
    pub fn ask_depth(&self, depth: usize) -> Vec<LevelView> {
        let mut views: Vec<LevelView> = self
            .asks
            .iter()
            .map(|(&price, level)| LevelView {
                price,
                total_qty: level.total_qty,
                order_count: level.order_count,
            })
            .collect();
        views.sort_by(|a, b| a.price.cmp(&b.price));
        views.truncate(depth);
        views
    }

    /// Release every resting node back to the pool and clear all book
    /// state. Statistics survive; they describe the session, not the
    /// resting set.
    pub fn release_all(&mut self, pool: &mut NodePool) {
        for (_, entry) in self.directory.drain() {
            pool.release(entry.handle);
        }
        self.bids.clear();
        self.asks.clear();
        self.best_bid = None;
        self.best_ask = None;
    }

    // ========================================================================
    // Consistency audit (test support)
    // ========================================================================

    /// Walk the entire book and panic on any structural inconsistency:
    /// ladder/directory membership, per-level totals and counts, FIFO
    /// sequence ordering, cached best prices, and the uncrossed-book
    /// rule. Intended for tests and debug sweeps; O(orders).
    pub fn audit(&self, pool: &NodePool) {
        let mut seen = 0usize;

        for (side, levels) in [(Side::Buy, &self.bids), (Side::Sell, &self.asks)] {
            for (&price, level) in levels {
                assert!(!level.is_empty(), "empty level left in ladder at {price}");

                let mut handle = level.head;
                let mut prev = crate::pool::NULL_HANDLE;
                let mut qty_sum = 0u64;
                let mut count = 0u32;
                let mut last_seq = 0u64;

                while handle != crate::pool::NULL_HANDLE {
                    let node = pool.get(handle);
                    assert_eq!(node.price, price, "node price disagrees with its level");
                    assert_eq!(node.side, side, "node side disagrees with its ladder");
                    assert_eq!(node.prev, prev, "broken back-link at {price}");
                    assert!(node.remaining_qty > 0, "zero-qty node left resting");
                    assert!(
                        count == 0 || node.arrival_seq > last_seq,
                        "FIFO sequence order violated at {price}"
                    );

                    let entry = self
                        .directory
                        .get(&node.order_id)
                        .unwrap_or_else(|| panic!("order {} missing from directory", node.order_id));
                    assert_eq!(entry.handle, handle);
                    assert_eq!(entry.price, price);
                    assert_eq!(entry.side, side);

                    qty_sum += node.remaining_qty as u64;
                    count += 1;
                    last_seq = node.arrival_seq;
                    prev = handle;
                    handle = node.next;
                }

                assert_eq!(level.tail, prev, "level tail disagrees with walk");
                assert_eq!(level.total_qty, qty_sum, "level total_qty disagrees");
                assert_eq!(level.order_count, count, "level order_count disagrees");
                seen += count as usize;
            }
        }

        assert_eq!(
            seen,
            self.directory.len(),
            "directory holds orders unreachable from the ladders"
        );
        assert_eq!(
            seen as u32,
            pool.live(),
            "pool live count disagrees with resting orders"
        );

        assert_eq!(self.best_bid, self.bids.keys().copied().max());
        assert_eq!(self.best_ask, self.asks.keys().copied().min());
        if let (Some(bid), Some(ask)) = (self.best_bid, self.best_ask) {
            assert!(bid < ask, "book is crossed: {bid} >= {ask}");
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid)
            .field("best_ask", &self.best_ask)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.directory.len())
            .field("traded_volume", &self.total_volume)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_node(
        pool: &mut NodePool,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        seq: u64,
    ) -> NodeHandle {
        let h = pool.acquire().unwrap();
        let node = pool.get_mut(h);
        node.order_id = order_id;
        node.side = side;
        node.price = price;
        node.remaining_qty = qty;
        node.original_qty = qty;
        node.arrival_seq = seq;
        h
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new();
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.mid_price(), None);
    }

    #[test]
    fn test_insert_updates_best() {
        let mut pool = NodePool::new(100);
        let mut book = OrderBook::new();

        let h1 = seed_node(&mut pool, 1, Side::Buy, 10000, 100, 1);
        book.insert_order(&mut pool, 1, Side::Buy, 10000, h1);
        assert_eq!(book.best_bid(), Some(10000));

        let h2 = seed_node(&mut pool, 2, Side::Buy, 10050, 100, 2);
        book.insert_order(&mut pool, 2, Side::Buy, 10050, h2);
        assert_eq!(book.best_bid(), Some(10050));

        let h3 = seed_node(&mut pool, 3, Side::Buy, 9950, 100, 3);
        book.insert_order(&mut pool, 3, Side::Buy, 9950, h3);
        assert_eq!(book.best_bid(), Some(10050));

        let h4 = seed_node(&mut pool, 4, Side::Sell, 10100, 100, 4);
        book.insert_order(&mut pool, 4, Side::Sell, 10100, h4);
        let h5 = seed_node(&mut pool, 5, Side::Sell, 10080, 100, 5);
        book.insert_order(&mut pool, 5, Side::Sell, 10080, h5);
        assert_eq!(book.best_ask(), Some(10080));

        assert_eq!(book.spread(), Some(30));
        assert_eq!(book.mid_price(), Some(10065));
        book.audit(&pool);
    }

    #[test]
    fn test_remove_recalculates_best() {
        let mut pool = NodePool::new(100);
        let mut book = OrderBook::new();

        for (id, price) in [(1u64, 10050u64), (2, 10000), (3, 9950)] {
            let h = seed_node(&mut pool, id, Side::Buy, price, 100, id);
            book.insert_order(&mut pool, id, Side::Buy, price, h);
        }

        assert_eq!(book.best_bid(), Some(10050));

        let entry = book.remove_order(&mut pool, 1).unwrap();
        pool.release(entry.handle);
        assert_eq!(book.best_bid(), Some(10000));

        let entry = book.remove_order(&mut pool, 2).unwrap();
        pool.release(entry.handle);
        assert_eq!(book.best_bid(), Some(9950));

        let entry = book.remove_order(&mut pool, 3).unwrap();
        pool.release(entry.handle);
        assert_eq!(book.best_bid(), None);
        assert!(book.is_empty());
        book.audit(&pool);
    }

    #[test]
    fn test_remove_unknown() {
        let mut pool = NodePool::new(10);
        let mut book = OrderBook::new();
        assert!(book.remove_order(&mut pool, 999).is_none());
    }

    #[test]
    fn test_depth_at_and_level_sharing() {
        let mut pool = NodePool::new(100);
        let mut book = OrderBook::new();

        for (id, qty) in [(1u64, 100u32), (2, 200), (3, 300)] {
            let h = seed_node(&mut pool, id, Side::Buy, 10000, qty, id);
            book.insert_order(&mut pool, id, Side::Buy, 10000, h);
        }

        assert_eq!(book.order_count(), 3);
        assert_eq!(book.bid_level_count(), 1);
        assert_eq!(book.depth_at(Side::Buy, 10000), (600, 3));

        let entry = book.remove_order(&mut pool, 2).unwrap();
        pool.release(entry.handle);
        assert_eq!(book.depth_at(Side::Buy, 10000), (400, 2));
        assert_eq!(book.best_bid(), Some(10000));
        book.audit(&pool);
    }

    #[test]
    fn test_depth_snapshots_ordered() {
        let mut pool = NodePool::new(100);
        let mut book = OrderBook::new();

        let mut id = 0u64;
        for price in [10020u64, 10000, 10010] {
            id += 1;
            let h = seed_node(&mut pool, id, Side::Sell, price, 10, id);
            book.insert_order(&mut pool, id, Side::Sell, price, h);
        }
        for price in [9990u64, 9970, 9980] {
            id += 1;
            let h = seed_node(&mut pool, id, Side::Buy, price, 10, id);
            book.insert_order(&mut pool, id, Side::Buy, price, h);
        }

        let asks = book.ask_depth(2);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].price, 10000);
        assert_eq!(asks[1].price, 10010);

        let bids = book.bid_depth(10);
        assert_eq!(bids.len(), 3);
        assert_eq!(bids[0].price, 9990);
        assert_eq!(bids[2].price, 9970);
    }

    #[test]
    fn test_crossable_qty() {
        let mut pool = NodePool::new(100);
        let mut book = OrderBook::new();

        let mut id = 0u64;
        for (price, qty) in [(10000u64, 30u32), (10010, 40), (10020, 50)] {
            id += 1;
            let h = seed_node(&mut pool, id, Side::Sell, price, qty, id);
            book.insert_order(&mut pool, id, Side::Sell, price, h);
        }

        assert_eq!(book.crossable_qty(Side::Buy, 9990), 0);
        assert_eq!(book.crossable_qty(Side::Buy, 10000), 30);
        assert_eq!(book.crossable_qty(Side::Buy, 10015), 70);
        assert_eq!(book.crossable_qty(Side::Buy, u64::MAX), 120);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut book = OrderBook::new();
        assert_eq!(book.avg_trade_price(), None);

        book.record_trade(100, 10);
        book.record_trade(200, 30);
        assert_eq!(book.traded_volume(), 40);
        assert_eq!(book.trade_count(), 2);
        // (100*10 + 200*30) / 40 = 175
        assert_eq!(book.avg_trade_price(), Some(175));
    }

    #[test]
    fn test_release_all() {
        let mut pool = NodePool::new(10);
        let mut book = OrderBook::new();

        for id in 1..=5u64 {
            let h = seed_node(&mut pool, id, Side::Buy, 9000 + id, 10, id);
            book.insert_order(&mut pool, id, Side::Buy, 9000 + id, h);
        }
        assert_eq!(pool.live(), 5);

        book.release_all(&mut pool);
        assert!(book.is_empty());
        assert_eq!(pool.live(), 0);
        assert_eq!(book.best_bid(), None);
        book.audit(&pool);
    }
}
