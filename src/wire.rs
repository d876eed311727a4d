//! Fixed-width little-endian wire codec for events, trades, and acks.
//!
//! Each record is a one-byte kind tag followed by fixed-width fields.
//! The codec handles one record per call; stream transports provide
//! their own framing around these payloads. The in-memory types carry
//! timestamps on cancel/modify that the wire form omits; decoding
//! fills those with zero.
//!
//! ```text
//! NewOrder: 1   | client_order_id:u64 | symbol_tag:u32 | side:u8
//!               | type:u8 | price:u64 | qty:u32 | ts_ns:u64
//! Cancel  : 2   | order_id:u64
//! Modify  : 3   | order_id:u64 | new_qty:u32 | new_price:u64
//! Shutdown: 255
//!
//! Trade   : exec_id:u64 | symbol_tag:u32 | aggressor_side:u8
//!               | buy_order_id:u64 | sell_order_id:u64
//!               | price:u64 | qty:u32 | ts_ns:u64
//!
//! Ack     : kind:u8 | order_id:u64 | client_order_id:u64
//!               | remaining_qty:u32 | [reason:u8 when rejected]
//!               | ts_ns:u64
//! ```

use std::fmt;

use crate::event::{Ack, AckKind, Event, NewOrder, OrderType, RejectReason, Side, Trade};

pub const EVENT_KIND_NEW_ORDER: u8 = 1;
pub const EVENT_KIND_CANCEL: u8 = 2;
pub const EVENT_KIND_MODIFY: u8 = 3;
pub const EVENT_KIND_SHUTDOWN: u8 = 255;

/// Encoded lengths, derived from the field lists above.
pub const NEW_ORDER_LEN: usize = 1 + 8 + 4 + 1 + 1 + 8 + 4 + 8;
pub const CANCEL_LEN: usize = 1 + 8;
pub const MODIFY_LEN: usize = 1 + 8 + 4 + 8;
pub const SHUTDOWN_LEN: usize = 1;
pub const TRADE_LEN: usize = 8 + 4 + 1 + 8 + 8 + 8 + 4 + 8;
pub const ACK_LEN: usize = 1 + 8 + 8 + 4 + 8;
pub const ACK_REJECTED_LEN: usize = ACK_LEN + 1;

const ACK_KIND_ACCEPTED: u8 = 1;
const ACK_KIND_REJECTED: u8 = 2;
const ACK_KIND_CANCELLED: u8 = 3;
const ACK_KIND_MODIFIED: u8 = 4;
const ACK_KIND_FILLED: u8 = 5;
const ACK_KIND_PARTIALLY_FILLED: u8 = 6;

/// Decode-side failures. Encoding is infallible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than the record demands.
    Truncated,
    /// Unrecognised kind tag.
    UnknownKind(u8),
    /// A field holds an unrepresentable value.
    InvalidField(&'static str),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated => write!(f, "buffer truncated"),
            WireError::UnknownKind(k) => write!(f, "unknown record kind: {k}"),
            WireError::InvalidField(field) => write!(f, "invalid field: {field}"),
        }
    }
}

impl std::error::Error for WireError {}

// ============================================================================
// Field helpers
// ============================================================================

struct Writer<'a>(&'a mut Vec<u8>);

impl Writer<'_> {
    #[inline]
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }
    #[inline]
    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
    #[inline]
    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        let v = *self.buf.get(self.pos).ok_or(WireError::Truncated)?;
        self.pos += 1;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or(WireError::Truncated)?;
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 8)
            .ok_or(WireError::Truncated)?;
        self.pos += 8;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }
}

fn side_from_u8(v: u8) -> Result<Side, WireError> {
    match v {
        0 => Ok(Side::Buy),
        1 => Ok(Side::Sell),
        _ => Err(WireError::InvalidField("side")),
    }
}

fn order_type_from_u8(v: u8) -> Result<OrderType, WireError> {
    match v {
        0 => Ok(OrderType::Limit),
        1 => Ok(OrderType::Market),
        2 => Ok(OrderType::ImmediateOrCancel),
        3 => Ok(OrderType::FillOrKill),
        _ => Err(WireError::InvalidField("order_type")),
    }
}

fn reason_to_u8(reason: RejectReason) -> u8 {
    reason as u8
}

fn reason_from_u8(v: u8) -> Result<RejectReason, WireError> {
    match v {
        0 => Ok(RejectReason::InvalidQuantity),
        1 => Ok(RejectReason::InvalidPrice),
        2 => Ok(RejectReason::UnknownOrder),
        3 => Ok(RejectReason::PoolExhausted),
        4 => Ok(RejectReason::FillOrKillUnfillable),
        _ => Err(WireError::InvalidField("reject_reason")),
    }
}

// ============================================================================
// Events
// ============================================================================

/// Append one encoded event to `out`.
pub fn encode_event(event: &Event, out: &mut Vec<u8>) {
    let mut w = Writer(out);
    match event {
        Event::NewOrder(n) => {
            w.u8(EVENT_KIND_NEW_ORDER);
            w.u64(n.client_order_id);
            w.u32(n.symbol_tag);
            w.u8(n.side as u8);
            w.u8(n.order_type as u8);
            w.u64(n.price);
            w.u32(n.qty);
            w.u64(n.ts_ns);
        }
        Event::Cancel { order_id, .. } => {
            w.u8(EVENT_KIND_CANCEL);
            w.u64(*order_id);
        }
        Event::Modify {
            order_id,
            new_qty,
            new_price,
            ..
        } => {
            w.u8(EVENT_KIND_MODIFY);
            w.u64(*order_id);
            w.u32(*new_qty);
            w.u64(*new_price);
        }
        Event::Shutdown => {
            w.u8(EVENT_KIND_SHUTDOWN);
        }
    }
}

/// Decode one event from the front of `buf`, returning it with the
/// number of bytes consumed.
pub fn decode_event(buf: &[u8]) -> Result<(Event, usize), WireError> {
    let mut r = Reader::new(buf);
    let kind = r.u8()?;

    let event = match kind {
        EVENT_KIND_NEW_ORDER => {
            let client_order_id = r.u64()?;
            let symbol_tag = r.u32()?;
            let side = side_from_u8(r.u8()?)?;
            let order_type = order_type_from_u8(r.u8()?)?;
            let price = r.u64()?;
            let qty = r.u32()?;
            let ts_ns = r.u64()?;
            Event::NewOrder(NewOrder {
                client_order_id,
                symbol_tag,
                side,
                order_type,
                price,
                qty,
                ts_ns,
            })
        }
        EVENT_KIND_CANCEL => Event::Cancel {
            order_id: r.u64()?,
            ts_ns: 0,
        },
        EVENT_KIND_MODIFY => Event::Modify {
            order_id: r.u64()?,
            new_qty: r.u32()?,
            new_price: r.u64()?,
            ts_ns: 0,
        },
        EVENT_KIND_SHUTDOWN => Event::Shutdown,
        other => return Err(WireError::UnknownKind(other)),
    };

    Ok((event, r.pos))
}

// ============================================================================
// Trades
// ============================================================================

/// Append one encoded trade to `out`.
pub fn encode_trade(trade: &Trade, out: &mut Vec<u8>) {
    let mut w = Writer(out);
    w.u64(trade.exec_id);
    w.u32(trade.symbol_tag);
    w.u8(trade.aggressor_side as u8);
    w.u64(trade.buy_order_id);
    w.u64(trade.sell_order_id);
    w.u64(trade.price);
    w.u32(trade.qty);
    w.u64(trade.ts_ns);
}

/// Decode one trade from the front of `buf`.
pub fn decode_trade(buf: &[u8]) -> Result<(Trade, usize), WireError> {
    let mut r = Reader::new(buf);
    let trade = Trade {
        exec_id: r.u64()?,
        symbol_tag: r.u32()?,
        aggressor_side: side_from_u8(r.u8()?)?,
        buy_order_id: r.u64()?,
        sell_order_id: r.u64()?,
        price: r.u64()?,
        qty: r.u32()?,
        ts_ns: r.u64()?,
    };
    Ok((trade, r.pos))
}

// ============================================================================
// Acks
// ============================================================================

/// Append one encoded ack to `out`. Rejections carry an extra reason
/// byte before the timestamp.
pub fn encode_ack(ack: &Ack, out: &mut Vec<u8>) {
    let mut w = Writer(out);
    let kind = match ack.kind {
        AckKind::Accepted => ACK_KIND_ACCEPTED,
        AckKind::Rejected(_) => ACK_KIND_REJECTED,
        AckKind::Cancelled => ACK_KIND_CANCELLED,
        AckKind::Modified => ACK_KIND_MODIFIED,
        AckKind::Filled => ACK_KIND_FILLED,
        AckKind::PartiallyFilled => ACK_KIND_PARTIALLY_FILLED,
    };
    w.u8(kind);
    w.u64(ack.order_id);
    w.u64(ack.client_order_id);
    w.u32(ack.remaining_qty);
    if let AckKind::Rejected(reason) = ack.kind {
        w.u8(reason_to_u8(reason));
    }
    w.u64(ack.ts_ns);
}

/// Decode one ack from the front of `buf`.
pub fn decode_ack(buf: &[u8]) -> Result<(Ack, usize), WireError> {
    let mut r = Reader::new(buf);
    let kind_tag = r.u8()?;
    let order_id = r.u64()?;
    let client_order_id = r.u64()?;
    let remaining_qty = r.u32()?;

    let kind = match kind_tag {
        ACK_KIND_ACCEPTED => AckKind::Accepted,
        ACK_KIND_REJECTED => AckKind::Rejected(reason_from_u8(r.u8()?)?),
        ACK_KIND_CANCELLED => AckKind::Cancelled,
        ACK_KIND_MODIFIED => AckKind::Modified,
        ACK_KIND_FILLED => AckKind::Filled,
        ACK_KIND_PARTIALLY_FILLED => AckKind::PartiallyFilled,
        other => return Err(WireError::UnknownKind(other)),
    };

    let ts_ns = r.u64()?;

    Ok((
        Ack {
            kind,
            order_id,
            client_order_id,
            remaining_qty,
            ts_ns,
        },
        r.pos,
    ))
}
