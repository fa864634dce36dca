//! Fixed-point numerics, branded identifiers, and the shared closed-set
//! enums used across the TradeForge engine. No I/O, no async: everything
//! here is a pure value type.

#![forbid(unsafe_code)]
#![warn(
    unused,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::cognitive_complexity
)]
#![allow(clippy::type_complexity)]

pub mod enums;
pub mod error;
pub mod fixed_point;
pub mod id;

pub use enums::{
    EventSource, Liquidity, OrderKind, OrderStatus, RejectReason, ReportKind, Side, TimeInForce,
    TriggerDirection,
};
pub use error::NotFoundError;
pub use fixed_point::{
    fee_on_notional, format_decimal, mul_div_floor, notional_of, parse_decimal, ArithmeticError,
    AssetAmount, AssetUnit, FixedPoint, NotionalInt, NotionalUnit, PriceInt, PriceUnit, QtyInt,
    QtyUnit, ValidationError,
};
pub use id::{AccountId, IdSequence, OrderId, SymbolId};

/// Integer milliseconds since the Unix epoch. Monotonic non-decreasing on
/// any single input stream (spec.md §3); the timeline merge is what
/// establishes a total order across streams.
pub type TimestampMs = i64;
