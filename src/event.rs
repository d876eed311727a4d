//! Event and record types for the matching core.
//!
//! Events are inputs drained from the ring by the consumer thread.
//! Trades and acks are the outputs published to the sinks.

/// Book-assigned order identifier, monotonic per book.
pub type OrderId = u64;
/// Opaque client-side order identifier; never interpreted by the core.
pub type ClientOrderId = u64;
/// Execution identifier, strictly monotonic per book.
pub type ExecId = u64;
/// Price in integer ticks. Never floating point.
pub type Price = u64;
/// Order quantity.
pub type Qty = u32;
/// Instrument tag carried on every emitted record.
pub type SymbolTag = u32;
/// Nanoseconds since the feed epoch.
pub type TsNanos = u64;

/// Most aggressive representable buy price; reserved for market buys.
pub const PRICE_MAX_SENTINEL: Price = u64::MAX;
/// Most aggressive representable sell price; reserved for market sells.
pub const PRICE_MIN_SENTINEL: Price = 0;

/// Order side (buy = bid, sell = ask).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type, resolved once at admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Rests in the book if not fully matched (default).
    #[default]
    Limit = 0,
    /// Matches at any price; residual is discarded, never rests.
    Market = 1,
    /// Matches up to its limit; residual is cancelled, never rests.
    ImmediateOrCancel = 2,
    /// All-or-nothing: rejected without touching the book unless the
    /// full quantity is fillable.
    FillOrKill = 3,
}

// ============================================================================
// Input events
// ============================================================================

/// Fields of a new order as decoded off the wire.
///
/// The book assigns `order_id` and `arrival_seq` at admission; everything
/// here is caller-supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub client_order_id: ClientOrderId,
    pub symbol_tag: SymbolTag,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price in ticks; ignored for `Market` orders.
    pub price: Price,
    pub qty: Qty,
    pub ts_ns: TsNanos,
}

/// Input events consumed from the ring, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    NewOrder(NewOrder),
    Cancel {
        order_id: OrderId,
        ts_ns: TsNanos,
    },
    Modify {
        order_id: OrderId,
        new_qty: Qty,
        new_price: Price,
        ts_ns: TsNanos,
    },
    /// Terminates the consumer loop; nothing may be pushed after it.
    Shutdown,
}

// ============================================================================
// Output records
// ============================================================================

/// An execution between an aggressive and a passive order.
///
/// Priced at the passive side, always.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub exec_id: ExecId,
    pub symbol_tag: SymbolTag,
    pub aggressor_side: Side,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub qty: Qty,
    pub ts_ns: TsNanos,
}

/// Why an event was rejected. Rejections are data, not errors: the core
/// mutates nothing for a rejected event and keeps processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    /// Zero quantity at admission or on modify.
    InvalidQuantity = 0,
    /// Price outside the representable ladder range.
    InvalidPrice = 1,
    /// Cancel/modify names an order not resting in the book.
    UnknownOrder = 2,
    /// The node pool has no free cell for a resting order.
    PoolExhausted = 3,
    /// A fill-or-kill order cannot be fully filled.
    FillOrKillUnfillable = 4,
}

/// Acknowledgement kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckKind {
    /// Rested untouched in the book.
    Accepted,
    Rejected(RejectReason),
    Cancelled,
    Modified,
    Filled,
    /// Traded partially and rested with the remainder.
    PartiallyFilled,
}

/// Per-event acknowledgement.
///
/// `order_id` is 0 when a `NewOrder` is rejected before an id was assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
    pub kind: AckKind,
    pub order_id: OrderId,
    pub client_order_id: ClientOrderId,
    pub remaining_qty: Qty,
    pub ts_ns: TsNanos,
}

impl Ack {
    /// Convenience constructor for a rejection ack.
    #[inline]
    pub const fn rejected(
        reason: RejectReason,
        order_id: OrderId,
        client_order_id: ClientOrderId,
        remaining_qty: Qty,
        ts_ns: TsNanos,
    ) -> Self {
        Self {
            kind: AckKind::Rejected(reason),
            order_id,
            client_order_id,
            remaining_qty,
            ts_ns,
        }
    }

    /// True if this ack reports a rejection.
    #[inline]
    pub const fn is_rejected(&self) -> bool {
        matches!(self.kind, AckKind::Rejected(_))
    }
}
