//! The matching/execution loop (spec.md §4.5): per-trade stop activation,
//! crossing, TIF handling, liquidity assignment, and participation-factor
//! gated fills. Grounded in `barter-execution/src/simulated/exchange/mod.rs`'s
//! `match_orders`/`FillGenerator` shape, generalised from a fixed
//! maker-fills-against-trade-print model to the stop/TIF/participation
//! matrix this engine requires.

use crate::order::{matching_key, Fees, Fill, Order};
use crate::orders_service::OrdersService;
use crate::state::ExchangeState;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use tradeforge_types::{
    Liquidity, NotFoundError, NotionalInt, OrderId, OrderKind, OrderStatus, PriceInt, QtyInt,
    ReportKind, Side, SymbolId, TimeInForce, TimestampMs, TriggerDirection,
};

/// A public trade print feeding the matching loop. Distinct from the
/// reader's on-wire record type (`reader::TradeRecord`), which carries the
/// file-cursor bookkeeping this type doesn't need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub ts: TimestampMs,
    pub symbol: SymbolId,
    pub price: PriceInt,
    pub qty: QtyInt,
    pub aggressor: Option<Side>,
    pub trade_ref: Option<String>,
}

/// The mutated subset of an `Order` carried on an `ORDER_UPDATED` report,
/// so downstream consumers don't need the whole order to observe a
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: OrderStatus,
    pub executed_qty: QtyInt,
    pub cumulative_quote: NotionalInt,
    pub fees: Fees,
    pub ts_updated: TimestampMs,
}

impl OrderPatch {
    pub fn from_order(order: &Order) -> Self {
        Self {
            status: order.status,
            executed_qty: order.executed_qty.clone(),
            cumulative_quote: order.cumulative_quote.clone(),
            fees: order.fees.clone(),
            ts_updated: order.ts_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub ts: TimestampMs,
    pub kind: ReportKind,
    pub order_id: Option<OrderId>,
    pub fill: Option<Fill>,
    pub patch: Option<OrderPatch>,
}

impl ExecutionReport {
    fn fill(ts: TimestampMs, order: &Order, fill: Fill) -> Self {
        Self {
            ts,
            kind: ReportKind::Fill,
            order_id: Some(order.id.clone()),
            fill: Some(fill),
            patch: Some(OrderPatch::from_order(order)),
        }
    }

    fn order_updated(ts: TimestampMs, order: &Order) -> Self {
        Self {
            ts,
            kind: ReportKind::OrderUpdated,
            order_id: Some(order.id.clone()),
            fill: None,
            patch: Some(OrderPatch::from_order(order)),
        }
    }

    pub fn end(ts: TimestampMs) -> Self {
        Self {
            ts,
            kind: ReportKind::End,
            order_id: None,
            fill: None,
            patch: None,
        }
    }
}

/// The two flags spec.md §9 names as an open question: both paths must be
/// preserved rather than collapsed into one. `treat_limit_as_maker` is
/// checked first; `use_aggressor_for_liquidity` only applies when it
/// doesn't already classify the order as MAKER (i.e. for MARKET orders, or
/// when `treat_limit_as_maker` is disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    pub treat_limit_as_maker: bool,
    pub use_aggressor_for_liquidity: bool,
    /// Integer multiplier of the trade's quantity that may be consumed by
    /// this matching pass; 0 disables matching against public prints
    /// entirely (strict conservative mode).
    pub participation_factor: u64,
    /// Simulated processing delay applied before a report is emitted,
    /// mirroring `ClientAccount::latency` in the grounding corpus. Never
    /// changes matching order or final state — only when the replay driver
    /// hands the report to the caller. Zero by default.
    pub processing_latency_ms: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            treat_limit_as_maker: true,
            use_aggressor_for_liquidity: false,
            participation_factor: 1,
            processing_latency_ms: 0,
        }
    }
}

pub struct MatchingEngine;

impl MatchingEngine {
    /// Runs one trade event through stop activation then crossing. Returns
    /// the execution reports emitted in matching-comparator order.
    pub fn process_trade(
        state: &mut ExchangeState,
        config: &MatchingConfig,
        event: &TradeEvent,
    ) -> Result<Vec<ExecutionReport>, NotFoundError> {
        let mut reports = Vec::new();

        Self::activate_triggered_stops(state, event)?;

        let mut remaining_trade_qty = QtyInt::from_raw(event.qty.raw() * BigInt::from(config.participation_factor));

        let mut snapshot: Vec<OrderId> = state
            .open_orders
            .get(&event.symbol)
            .cloned()
            .unwrap_or_default();
        snapshot.sort_by_key(|id| {
            state
                .orders
                .get(id)
                .map(matching_key)
                .unwrap_or_default()
        });

        for order_id in &snapshot {
            if remaining_trade_qty.is_zero() {
                break;
            }
            let Some(order) = state.orders.get(order_id) else {
                continue;
            };
            if !order.status.is_active() {
                continue;
            }

            let crosses = Self::crosses(order, &event.price);
            let remaining_order_qty = order.remaining_qty();
            let tif = order.tif;

            if tif == TimeInForce::Fok && (!crosses || remaining_trade_qty < remaining_order_qty) {
                OrdersService::cancel_order(state, order_id, event.ts).map_err(to_not_found)?;
                let order = state.orders.get(order_id).unwrap();
                debug!(order_id = %order_id, "FOK order cancelled: insufficient crossing liquidity");
                reports.push(ExecutionReport::order_updated(event.ts, order));
                continue;
            }

            if !crosses {
                trace!(order_id = %order_id, "order does not cross this trade, skipping");
                continue;
            }

            let fill_qty = if remaining_order_qty < remaining_trade_qty {
                remaining_order_qty
            } else {
                remaining_trade_qty.clone()
            };
            if fill_qty.is_zero() {
                continue;
            }

            let liquidity = Self::assign_liquidity(order, event, config);
            let fill = Fill {
                ts: event.ts,
                order_id: order_id.clone(),
                price: event.price.clone(),
                qty: fill_qty.clone(),
                side: order.side,
                liquidity,
                trade_ref: event.trade_ref.clone(),
                source_aggressor: event.aggressor,
            };

            OrdersService::apply_fill(state, order_id, fill.clone()).map_err(to_not_found)?;
            let order = state.orders.get(order_id).unwrap();
            reports.push(ExecutionReport::fill(event.ts, order, fill));

            if order.status == OrderStatus::Filled {
                OrdersService::close_order(state, order_id, event.ts, OrderStatus::Filled)
                    .map_err(to_not_found)?;
            }

            remaining_trade_qty = remaining_trade_qty
                .checked_sub(&fill_qty)
                .expect("fill_qty never exceeds remaining_trade_qty");
        }

        for order_id in &snapshot {
            let Some(order) = state.orders.get(order_id) else {
                continue;
            };
            if order.tif == TimeInForce::Ioc && order.status.is_active() {
                OrdersService::cancel_order(state, order_id, event.ts).map_err(to_not_found)?;
                let order = state.orders.get(order_id).unwrap();
                debug!(order_id = %order_id, "IOC remainder cancelled at end of trade event");
                reports.push(ExecutionReport::order_updated(event.ts, order));
            }
        }

        Ok(reports)
    }

    fn activate_triggered_stops(
        state: &mut ExchangeState,
        event: &TradeEvent,
    ) -> Result<(), NotFoundError> {
        let mut triggered: Vec<OrderId> = state
            .stop_orders
            .get(&event.symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|id| {
                state
                    .orders
                    .get(id)
                    .map(|order| Self::stop_triggered(order, &event.price))
                    .unwrap_or(false)
            })
            .collect();
        triggered.sort_by_key(|id| state.orders.get(id).map(matching_key).unwrap_or_default());

        for order_id in triggered {
            OrdersService::activate_stop_order(state, &order_id, event.ts, &event.price)?;
        }
        Ok(())
    }

    fn stop_triggered(order: &Order, trade_price: &PriceInt) -> bool {
        let (Some(trigger), Some(direction)) = (&order.trigger_price, order.trigger_direction)
        else {
            return false;
        };
        match direction {
            TriggerDirection::Up => trade_price >= trigger,
            TriggerDirection::Down => trade_price <= trigger,
        }
    }

    fn crosses(order: &Order, trade_price: &PriceInt) -> bool {
        match order.kind {
            OrderKind::Market | OrderKind::StopMarket => true,
            OrderKind::Limit | OrderKind::StopLimit => {
                let order_price = order.price.as_ref().expect("limit order always has a price");
                match order.side {
                    Side::Buy => trade_price <= order_price,
                    Side::Sell => trade_price >= order_price,
                }
            }
        }
    }

    fn assign_liquidity(order: &Order, event: &TradeEvent, config: &MatchingConfig) -> Liquidity {
        if config.treat_limit_as_maker && order.kind.is_limit() {
            return Liquidity::Maker;
        }
        if config.use_aggressor_for_liquidity {
            if let Some(aggressor) = event.aggressor {
                return if aggressor == order.side {
                    Liquidity::Maker
                } else {
                    Liquidity::Taker
                };
            }
        }
        Liquidity::Taker
    }
}

fn to_not_found(err: crate::error::AccountsError) -> NotFoundError {
    match err {
        crate::error::AccountsError::NotFound(e) => e,
        other => unreachable!("matching loop never drives accounts into validation/arithmetic failure: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts_service::AccountsService;
    use crate::config::{FeeSchedule, SymbolConfig};
    use crate::orders_service::PlaceOrderInput;
    use num_bigint::BigInt;
    use tradeforge_types::{AssetAmount, IdSequence};

    fn setup() -> (ExchangeState, SymbolId, tradeforge_types::AccountId) {
        let mut state = ExchangeState::new();
        let symbol = SymbolId::from_seq(1);
        state.register_symbol(SymbolConfig::new(symbol.clone(), "BTC", "USDT", 2, 3));
        state.fee = FeeSchedule::new(10, 10); // 10 bps maker and taker

        let account = AccountsService::create_account(&IdSequence::new(), None);
        let account_id = account.id.clone();
        state.accounts.insert(account_id.clone(), account);
        (state, symbol, account_id)
    }

    fn price(v: &str) -> PriceInt {
        PriceInt::from_decimal_str(v, 2).unwrap()
    }
    fn qty(v: &str) -> QtyInt {
        QtyInt::from_decimal_str(v, 3).unwrap()
    }

    #[test]
    fn test_limit_buy_partial_fill_scenario() {
        let (mut state, symbol, account_id) = setup();
        AccountsService::deposit(&mut state.accounts, &account_id, "USDT", &AssetAmount::from_raw(BigInt::from(20000))).unwrap();

        let order = OrdersService::place_order(
            &mut state,
            0,
            PlaceOrderInput {
                account_id: account_id.clone(),
                symbol: symbol.clone(),
                kind: OrderKind::Limit,
                side: Side::Buy,
                tif: TimeInForce::Gtc,
                price: Some(price("100.00")),
                qty: qty("1.000"),
                trigger_price: None,
                trigger_direction: None,
            },
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Open);

        let config = MatchingConfig::default();
        let reports = MatchingEngine::process_trade(
            &mut state,
            &config,
            &TradeEvent {
                ts: 1,
                symbol: symbol.clone(),
                price: price("99.00"),
                qty: qty("0.300"),
                aggressor: Some(Side::Sell),
                trade_ref: None,
            },
        )
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::Fill);
        let fill = reports[0].fill.as_ref().unwrap();
        assert_eq!(fill.qty, qty("0.300"));
        assert_eq!(fill.liquidity, Liquidity::Maker);

        let order = state.orders.get(&order.id).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.executed_qty, qty("0.300"));
        assert_eq!(order.fees.maker, NotionalInt::from_raw(BigInt::from(2)));

        let snapshot = AccountsService::balances_snapshot(&state.accounts, &account_id).unwrap();
        assert_eq!(snapshot["BTC"].free, AssetAmount::from_raw(BigInt::from(300)));
    }

    #[test]
    fn test_fok_cancels_on_insufficient_trade_depth() {
        let (mut state, symbol, account_id) = setup();
        AccountsService::deposit(&mut state.accounts, &account_id, "USDT", &AssetAmount::from_raw(BigInt::from(50000))).unwrap();

        let order = OrdersService::place_order(
            &mut state,
            0,
            PlaceOrderInput {
                account_id: account_id.clone(),
                symbol: symbol.clone(),
                kind: OrderKind::Limit,
                side: Side::Buy,
                tif: TimeInForce::Fok,
                price: Some(price("101.00")),
                qty: qty("1.000"),
                trigger_price: None,
                trigger_direction: None,
            },
        )
        .unwrap();

        let config = MatchingConfig::default();
        let reports = MatchingEngine::process_trade(
            &mut state,
            &config,
            &TradeEvent {
                ts: 16,
                symbol: symbol.clone(),
                price: price("101.00"),
                qty: qty("0.600"),
                aggressor: Some(Side::Sell),
                trade_ref: None,
            },
        )
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::OrderUpdated);
        assert!(reports[0].fill.is_none());

        let order = state.orders.get(&order.id).unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert!(order.fills.is_empty());

        let snapshot = AccountsService::balances_snapshot(&state.accounts, &account_id).unwrap();
        assert_eq!(snapshot["USDT"].free, AssetAmount::from_raw(BigInt::from(50000)));
        assert_eq!(snapshot["USDT"].locked, AssetAmount::zero());
    }

    #[test]
    fn test_stop_limit_activation_then_fill_scenario() {
        let (mut state, symbol, account_id) = setup();
        AccountsService::deposit(&mut state.accounts, &account_id, "USDT", &AssetAmount::from_raw(BigInt::from(200_000))).unwrap();

        let order = OrdersService::place_order(
            &mut state,
            0,
            PlaceOrderInput {
                account_id: account_id.clone(),
                symbol: symbol.clone(),
                kind: OrderKind::StopLimit,
                side: Side::Buy,
                tif: TimeInForce::Gtc,
                price: Some(price("101.00")),
                qty: qty("1.000"),
                trigger_price: Some(price("100.00")),
                trigger_direction: Some(TriggerDirection::Up),
            },
        )
        .unwrap();
        assert_eq!(state.stop_order_count(&symbol), 1);
        assert_eq!(state.open_order_count(&symbol), 0);

        let config = MatchingConfig::default();
        let trades = [
            (1i64, "99.00", "0.400"),
            (2, "100.00", "0.600"),
            (3, "101.00", "0.400"),
        ];
        let mut all_reports = Vec::new();
        for (ts, p, q) in trades {
            let reports = MatchingEngine::process_trade(
                &mut state,
                &config,
                &TradeEvent {
                    ts,
                    symbol: symbol.clone(),
                    price: price(p),
                    qty: qty(q),
                    aggressor: Some(Side::Buy),
                    trade_ref: None,
                },
            )
            .unwrap();
            all_reports.extend(reports);
        }

        assert_eq!(state.stop_order_count(&symbol), 0);
        let fills: Vec<_> = all_reports
            .iter()
            .filter(|r| r.kind == ReportKind::Fill)
            .collect();
        assert_eq!(fills.len(), 2);

        let order = state.orders.get(&order.id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_qty, qty("1.000"));
        assert_eq!(order.kind, OrderKind::Limit);
    }
}
