//! # Pulse-LOB
//!
//! A deterministic, single-symbol limit order book matching core with a
//! lock-free SPSC event pipeline.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: the consumer thread owns the book, the pool,
//!   and the directory exclusively (no locks anywhere in the core)
//! - **O(1) Operations**: insert, cancel, and per-fill matching run in
//!   constant time regardless of book depth
//! - **Cache-Optimized**: 64-byte aligned order nodes, 32-bit handles,
//!   cache-line-isolated ring counters
//! - **Pool Allocation**: no heap traffic on the hot path; the node
//!   supply is fixed at construction
//! - **Deterministic**: identical event streams produce bit-identical
//!   trade and ack streams
//!
//! ## Architecture
//!
//! ```text
//! [Producer Thread] --> [SPSC Ring <Event>] --> [Consumer Thread (pinned)]
//!                                                       |
//!                                            [Trade Sink / Ack Sink]
//! ```

pub mod book;
pub mod event;
pub mod level;
pub mod matching;
pub mod pipeline;
pub mod pool;
pub mod ring;
pub mod wire;

// Re-exports for convenience
pub use book::{LevelView, OrderBook, OrderRef};
pub use event::{
    Ack, AckKind, ClientOrderId, Event, ExecId, NewOrder, OrderId, OrderType, Price, Qty,
    RejectReason, Side, SymbolTag, Trade, TsNanos,
};
pub use level::PriceLevel;
pub use matching::{MatchingEngine, ModifyOutcome, SubmitOutcome};
pub use pipeline::{EventProducer, Pipeline, Sink};
pub use pool::{NodeHandle, NodePool, OrderNode, NULL_HANDLE};
pub use ring::{ring, Consumer, PopError, Producer, PushError};
