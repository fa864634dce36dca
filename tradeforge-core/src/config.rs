//! Per-run configuration surface: symbol registration and the fee
//! schedule. Plain `serde::Deserialize` structs, the way a caller already
//! building `ExchangeState` via its builder would load them from JSON.

use serde::{Deserialize, Serialize};
use tradeforge_types::SymbolId;

/// Immutable once registered. `priceScale`/`qtyScale` govern every decimal
/// string conversion for this symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub id: SymbolId,
    pub base: String,
    pub quote: String,
    pub price_scale: u32,
    pub qty_scale: u32,
}

impl SymbolConfig {
    pub fn new(
        id: SymbolId,
        base: impl Into<String>,
        quote: impl Into<String>,
        price_scale: u32,
        qty_scale: u32,
    ) -> Self {
        Self {
            id,
            base: base.into(),
            quote: quote.into(),
            price_scale,
            qty_scale,
        }
    }
}

/// Non-negative maker/taker fee rates in basis points. Fee on a fill is
/// `floor(notional * bps / 10_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker_bps: u32,
    pub taker_bps: u32,
}

impl FeeSchedule {
    pub fn new(maker_bps: u32, taker_bps: u32) -> Self {
        Self {
            maker_bps,
            taker_bps,
        }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }
}
