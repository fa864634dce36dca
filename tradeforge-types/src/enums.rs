//! Small closed sets shared by the order, fill, and matching types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Good-til-cancelled: rests until filled or explicitly cancelled.
    Gtc,
    /// Immediate-or-cancel: any unfilled remainder is cancelled at the end
    /// of the triggering event.
    Ioc,
    /// Fill-or-kill: filled in full within one trade event, or not at all.
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Limit,
    Market,
    StopLimit,
    StopMarket,
}

impl OrderKind {
    /// Is this kind a stop order, i.e. indexed in `stopOrders` until
    /// activation?
    pub fn is_stop(self) -> bool {
        matches!(self, OrderKind::StopLimit | OrderKind::StopMarket)
    }

    /// The kind this stop order becomes once its trigger fires.
    pub fn activated(self) -> OrderKind {
        match self {
            OrderKind::StopLimit => OrderKind::Limit,
            OrderKind::StopMarket => OrderKind::Market,
            other => other,
        }
    }

    pub fn is_limit(self) -> bool {
        matches!(self, OrderKind::Limit | OrderKind::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liquidity {
    Maker,
    Taker,
}

/// The order lifecycle state machine (spec.md §4.3). `Open` and
/// `PartiallyFilled` are the only statuses tracked in either the
/// `openOrders` or `stopOrders` index; everything else is terminal or
/// pre-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

/// Machine-readable reason attached to a `REJECTED` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    UnknownSymbol,
    UnsupportedExecution,
    InsufficientFunds,
    InvalidParams,
}

/// Which of the two input streams a timeline event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Trades,
    Depth,
}

impl EventSource {
    pub fn opposite(self) -> EventSource {
        match self {
            EventSource::Trades => EventSource::Depth,
            EventSource::Depth => EventSource::Trades,
        }
    }
}

/// Kind tag on an emitted execution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    Fill,
    OrderUpdated,
    End,
}
