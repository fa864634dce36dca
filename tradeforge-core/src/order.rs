use serde::{Deserialize, Serialize};
use tradeforge_types::{
    AccountId, AssetAmount, Liquidity, NotionalInt, OrderId, OrderKind, OrderStatus, PriceInt,
    QtyInt, RejectReason, Side, SymbolId, TimeInForce, TimestampMs, TriggerDirection,
};

/// The outstanding reservation backing a working order, e.g. locked quote
/// for a LIMIT BUY or locked base for a LIMIT SELL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserved {
    pub currency: String,
    pub total: AssetAmount,
    pub remaining: AssetAmount,
}

/// Per-liquidity-role cumulative fees paid by this order so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub maker: NotionalInt,
    pub taker: NotionalInt,
}

impl Fees {
    pub fn zero() -> Self {
        Self {
            maker: NotionalInt::zero(),
            taker: NotionalInt::zero(),
        }
    }

    pub fn for_liquidity(&self, liquidity: Liquidity) -> &NotionalInt {
        match liquidity {
            Liquidity::Maker => &self.maker,
            Liquidity::Taker => &self.taker,
        }
    }

    pub fn add(&mut self, liquidity: Liquidity, fee: &NotionalInt) {
        match liquidity {
            Liquidity::Maker => {
                self.maker = self
                    .maker
                    .checked_add(fee)
                    .expect("fee accumulation cannot overflow a checked domain value")
            }
            Liquidity::Taker => {
                self.taker = self
                    .taker
                    .checked_add(fee)
                    .expect("fee accumulation cannot overflow a checked domain value")
            }
        }
    }
}

/// Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub ts: TimestampMs,
    pub order_id: OrderId,
    pub price: PriceInt,
    pub qty: QtyInt,
    pub side: Side,
    pub liquidity: Liquidity,
    pub trade_ref: Option<String>,
    pub source_aggressor: Option<Side>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub ts_created: TimestampMs,
    pub ts_updated: TimestampMs,
    pub symbol: SymbolId,
    pub kind: OrderKind,
    pub side: Side,
    pub tif: TimeInForce,
    pub price: Option<PriceInt>,
    pub qty: QtyInt,
    pub status: OrderStatus,
    pub account_id: AccountId,
    pub executed_qty: QtyInt,
    pub cumulative_quote: NotionalInt,
    pub fees: Fees,
    pub fills: Vec<Fill>,
    pub reserved: Option<Reserved>,
    pub trigger_price: Option<PriceInt>,
    pub trigger_direction: Option<TriggerDirection>,
    pub activated: Option<bool>,
    pub reject_reason: Option<RejectReason>,
}

impl Order {
    pub fn remaining_qty(&self) -> QtyInt {
        self.qty
            .checked_sub(&self.executed_qty)
            .expect("executed_qty can never exceed qty")
    }

    pub fn is_fully_filled(&self) -> bool {
        self.executed_qty == self.qty
    }

    pub fn is_working(&self) -> bool {
        self.status.is_active()
    }

    /// Collapses a stop order's type/timestamps at activation time, per
    /// spec.md §4.3.
    pub fn activate_stop(&mut self, ts: TimestampMs) {
        self.kind = self.kind.activated();
        self.ts_created = ts;
        self.ts_updated = ts;
        self.activated = Some(true);
    }
}

/// The matching-comparator key: older `ts_created` first, then lexically
/// smaller `id` (spec.md §4.5's "stable, total" comparator).
pub fn matching_key(order: &Order) -> (TimestampMs, String) {
    (order.ts_created, order.id.as_str().to_string())
}
