//! Order lifecycle, reservation accounting, stop activation, and fill
//! application (spec.md §4.3). Grounded in
//! `barter-execution/src/simulated/exchange/account/mod.rs`'s
//! `try_open_order_atomic`/`try_cancel_order_atomic` shape, generalised
//! from a fixed maker-only book to the full LIMIT/MARKET/STOP × GTC/IOC/FOK
//! matrix spec.md requires.

use crate::accounts_service::AccountsService;
use crate::error::AccountsError;
use crate::order::{Fees, Fill, Order, Reserved};
use crate::state::ExchangeState;
use tracing::{debug, warn};
use tradeforge_types::{
    fee_on_notional, notional_of, AccountId, AssetAmount, NotFoundError, NotionalInt, OrderId,
    OrderKind, OrderStatus, PriceInt, QtyInt, RejectReason, Side, SymbolId, TimeInForce,
    TimestampMs, TriggerDirection,
};

pub struct OrdersService;

/// The caller-supplied side of a `placeOrder` call. Everything past the
/// symbol/account lookup is validated and, on failure, folded into a
/// `REJECTED` order rather than an `Err` (spec.md §7/§11.2).
#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub account_id: AccountId,
    pub symbol: SymbolId,
    pub kind: OrderKind,
    pub side: Side,
    pub tif: TimeInForce,
    pub price: Option<PriceInt>,
    pub qty: QtyInt,
    pub trigger_price: Option<PriceInt>,
    pub trigger_direction: Option<TriggerDirection>,
}

fn reject(mut order: Order, ts: TimestampMs, reason: RejectReason) -> Order {
    order.status = OrderStatus::Rejected;
    order.reject_reason = Some(reason);
    order.ts_updated = ts;
    order
}

impl OrdersService {
    /// Always returns an `Order`; the only `Err` case is an unknown
    /// `account_id`, a caller bug rather than a business outcome.
    pub fn place_order(
        state: &mut ExchangeState,
        ts: TimestampMs,
        input: PlaceOrderInput,
    ) -> Result<Order, NotFoundError> {
        if !state.accounts.contains_key(&input.account_id) {
            return Err(NotFoundError::Account(input.account_id));
        }

        let order_id = OrderId::from_seq(state.order_seq.next());
        let order = Order {
            id: order_id.clone(),
            ts_created: ts,
            ts_updated: ts,
            symbol: input.symbol.clone(),
            kind: input.kind,
            side: input.side,
            tif: input.tif,
            price: input.price.clone(),
            qty: input.qty.clone(),
            status: OrderStatus::New,
            account_id: input.account_id.clone(),
            executed_qty: QtyInt::zero(),
            cumulative_quote: NotionalInt::zero(),
            fees: Fees::zero(),
            fills: Vec::new(),
            reserved: None,
            trigger_price: input.trigger_price.clone(),
            trigger_direction: input.trigger_direction,
            activated: if input.kind.is_stop() { Some(false) } else { None },
            reject_reason: None,
        };

        let Some(symbol_config) = state.symbols.get(&input.symbol).cloned() else {
            debug!(order_id = %order_id, symbol = %input.symbol, "place_order: unknown symbol");
            let order = reject(order, ts, RejectReason::UnknownSymbol);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        };

        if !order.qty.is_positive() {
            let order = reject(order, ts, RejectReason::InvalidParams);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        }
        if input.kind == OrderKind::Market && input.tif == TimeInForce::Fok {
            let order = reject(order, ts, RejectReason::UnsupportedExecution);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        }
        if input.kind.is_limit() && !matches!(&order.price, Some(p) if p.is_positive()) {
            let order = reject(order, ts, RejectReason::InvalidParams);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        }
        if input.kind.is_stop()
            && !matches!(&order.trigger_price, Some(p) if p.is_positive())
        {
            let order = reject(order, ts, RejectReason::InvalidParams);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        }

        let mut order = order;
        if !Self::reserve_for_new_order(state, &symbol_config, &mut order) {
            let order = reject(order, ts, RejectReason::InsufficientFunds);
            state.orders.insert(order.id.clone(), order.clone());
            return Ok(order);
        }

        order.status = OrderStatus::Open;
        if input.kind.is_stop() {
            state.add_stop_order(&input.symbol, order.id.clone());
        } else {
            state.add_open_order(&input.symbol, order.id.clone());
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    /// Returns `false` (order left unreserved) on insufficient funds.
    /// `true` covers both "reserved successfully" and "no reservation is
    /// required at placement" (MARKET/STOP_MARKET BUY).
    fn reserve_for_new_order(
        state: &mut ExchangeState,
        symbol: &crate::config::SymbolConfig,
        order: &mut Order,
    ) -> bool {
        match (order.kind, order.side) {
            (OrderKind::Limit, Side::Buy) | (OrderKind::StopLimit, Side::Buy) => {
                let price = order.price.as_ref().expect("validated positive price");
                let notional = notional_of(price, &order.qty, symbol.qty_scale);
                let fee = fee_on_notional(&notional, state.fee.maker_bps);
                let total = notional
                    .checked_add(&fee)
                    .expect("reservation total cannot overflow")
                    .as_asset_amount();
                Self::lock_reservation(state, order, &symbol.quote, total)
            }
            (OrderKind::Limit, Side::Sell)
            | (OrderKind::StopLimit, Side::Sell)
            | (OrderKind::Market, Side::Sell)
            | (OrderKind::StopMarket, Side::Sell) => {
                let amount = order.qty.as_asset_amount();
                Self::lock_reservation(state, order, &symbol.base, amount)
            }
            (OrderKind::Market, Side::Buy) | (OrderKind::StopMarket, Side::Buy) => true,
        }
    }

    fn lock_reservation(
        state: &mut ExchangeState,
        order: &mut Order,
        currency: &str,
        amount: AssetAmount,
    ) -> bool {
        match AccountsService::lock(&mut state.accounts, &order.account_id, currency, &amount) {
            Ok(true) => {
                order.reserved = Some(Reserved {
                    currency: currency.to_string(),
                    total: amount.clone(),
                    remaining: amount,
                });
                true
            }
            _ => false,
        }
    }

    /// Tops up an order's reservation to at least `required`, locking only
    /// the shortfall. Best-effort: returns `false` if the account cannot
    /// cover the shortfall, leaving the existing (insufficient)
    /// reservation untouched.
    fn ensure_reservation_capacity(
        state: &mut ExchangeState,
        order_id: &OrderId,
        currency: &str,
        required: &AssetAmount,
    ) -> bool {
        let (account_id, current_remaining) = {
            let order = state.orders.get(order_id).expect("order must exist");
            (
                order.account_id.clone(),
                order
                    .reserved
                    .as_ref()
                    .map(|r| r.remaining.clone())
                    .unwrap_or_else(AssetAmount::zero),
            )
        };
        if &current_remaining >= required {
            return true;
        }
        let shortfall = required
            .checked_sub(&current_remaining)
            .expect("required > current_remaining, checked above");
        if !AccountsService::lock(&mut state.accounts, &account_id, currency, &shortfall)
            .unwrap_or(false)
        {
            return false;
        }
        let order = state.orders.get_mut(order_id).expect("order must exist");
        match &mut order.reserved {
            Some(reserved) => {
                reserved.total = reserved
                    .total
                    .checked_add(&shortfall)
                    .expect("reservation top-up cannot overflow");
                reserved.remaining = reserved
                    .remaining
                    .checked_add(&shortfall)
                    .expect("reservation top-up cannot overflow");
            }
            None => {
                order.reserved = Some(Reserved {
                    currency: currency.to_string(),
                    total: shortfall.clone(),
                    remaining: shortfall,
                });
            }
        }
        true
    }

    fn decrement_reserved_remaining(state: &mut ExchangeState, order_id: &OrderId, amount: &AssetAmount) {
        if let Some(order) = state.orders.get_mut(order_id) {
            if let Some(reserved) = &mut order.reserved {
                reserved.remaining = reserved
                    .remaining
                    .checked_sub(amount)
                    .unwrap_or_else(|_| AssetAmount::zero());
            }
        }
    }

    /// Applies a fill to an active order. BUY settles by consuming the
    /// notional (plus fee) from locked quote and crediting base; SELL
    /// settles by consuming qty from locked base and crediting notional
    /// (less fee) to free quote. Per spec.md §9's open question, a BUY
    /// fill that needs more quote than is currently reserved tops up the
    /// reservation just-in-time (this subsumes the explicit
    /// MARKET/STOP_MARKET BUY case and covers a resting LIMIT BUY that
    /// unexpectedly settles as taker); failure to cover the shortfall
    /// rejects the order with no rollback of fills already applied.
    pub fn apply_fill(
        state: &mut ExchangeState,
        order_id: &OrderId,
        fill: Fill,
    ) -> Result<(), AccountsError> {
        let symbol_config = {
            let order = state
                .orders
                .get(order_id)
                .ok_or_else(|| NotFoundError::Order(order_id.clone()))?;
            state
                .symbols
                .get(&order.symbol)
                .cloned()
                .expect("order symbol always registered")
        };

        let notional = notional_of(&fill.price, &fill.qty, symbol_config.qty_scale);
        let bps = match fill.liquidity {
            tradeforge_types::Liquidity::Maker => state.fee.maker_bps,
            tradeforge_types::Liquidity::Taker => state.fee.taker_bps,
        };
        let fee = fee_on_notional(&notional, bps);

        let (account_id, side) = {
            let order = state.orders.get(order_id).unwrap();
            (order.account_id.clone(), order.side)
        };

        match side {
            Side::Buy => {
                let required = notional
                    .checked_add(&fee)
                    .expect("notional + fee cannot overflow")
                    .as_asset_amount();
                if !Self::ensure_reservation_capacity(state, order_id, &symbol_config.quote, &required) {
                    warn!(order_id = %order_id, "apply_fill: insufficient quote to cover BUY fill, rejecting remainder");
                    Self::reject_remainder(state, order_id, fill.ts, RejectReason::InsufficientFunds)?;
                    return Ok(());
                }
                AccountsService::consume_locked(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.quote,
                    &notional.as_asset_amount(),
                )?;
                AccountsService::apply_trade_fee(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.quote,
                    &fee.as_asset_amount(),
                    true,
                )?;
                AccountsService::deposit(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.base,
                    &fill.qty.as_asset_amount(),
                )?;
                Self::decrement_reserved_remaining(state, order_id, &required);
            }
            Side::Sell => {
                AccountsService::consume_locked(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.base,
                    &fill.qty.as_asset_amount(),
                )?;
                Self::decrement_reserved_remaining(state, order_id, &fill.qty.as_asset_amount());
                AccountsService::deposit(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.quote,
                    &notional.as_asset_amount(),
                )?;
                AccountsService::apply_trade_fee(
                    &mut state.accounts,
                    &account_id,
                    &symbol_config.quote,
                    &fee.as_asset_amount(),
                    false,
                )?;
            }
        }

        let order = state.orders.get_mut(order_id).unwrap();
        order.executed_qty = order
            .executed_qty
            .checked_add(&fill.qty)
            .expect("executed_qty cannot exceed qty");
        order.cumulative_quote = order
            .cumulative_quote
            .checked_add(&notional)
            .expect("cumulative_quote accumulation cannot overflow");
        order.fees.add(fill.liquidity, &fee);
        order.ts_updated = fill.ts;
        order.fills.push(fill);
        order.status = if order.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Ok(())
    }

    /// No-rollback termination of a BUY whose remainder cannot be
    /// covered: the order is rejected in place, retaining any fills
    /// already applied (spec.md §9 open question).
    fn reject_remainder(
        state: &mut ExchangeState,
        order_id: &OrderId,
        ts: TimestampMs,
        reason: RejectReason,
    ) -> Result<(), AccountsError> {
        Self::close_order(state, order_id, ts, OrderStatus::Rejected)?;
        let order = state.orders.get_mut(order_id).unwrap();
        order.reject_reason = Some(reason);
        Ok(())
    }

    /// Idempotent: cancelling an order already in a terminal state is a
    /// no-op.
    pub fn cancel_order(
        state: &mut ExchangeState,
        order_id: &OrderId,
        ts: TimestampMs,
    ) -> Result<(), AccountsError> {
        let status = state
            .orders
            .get(order_id)
            .ok_or_else(|| NotFoundError::Order(order_id.clone()))?
            .status;
        if !status.is_active() {
            return Ok(());
        }
        Self::close_order(state, order_id, ts, OrderStatus::Canceled)
    }

    /// Sweeps the order out of whichever index holds it and releases any
    /// residual (unused) reservation back to `free`.
    pub fn close_order(
        state: &mut ExchangeState,
        order_id: &OrderId,
        ts: TimestampMs,
        terminal_status: OrderStatus,
    ) -> Result<(), AccountsError> {
        let (account_id, symbol, is_stop, reserved) = {
            let order = state
                .orders
                .get(order_id)
                .ok_or_else(|| NotFoundError::Order(order_id.clone()))?;
            (
                order.account_id.clone(),
                order.symbol.clone(),
                order.kind.is_stop(),
                order.reserved.clone(),
            )
        };

        if let Some(reserved) = &reserved {
            if reserved.remaining.is_positive() {
                AccountsService::unlock(
                    &mut state.accounts,
                    &account_id,
                    &reserved.currency,
                    &reserved.remaining,
                )?;
            }
        }

        if is_stop {
            state.remove_stop_order(&symbol, order_id);
        } else {
            state.remove_open_order(&symbol, order_id);
        }

        let order = state.orders.get_mut(order_id).unwrap();
        order.status = terminal_status;
        order.ts_updated = ts;
        if let Some(reserved) = &mut order.reserved {
            reserved.remaining = AssetAmount::zero();
        }
        Ok(())
    }

    /// Moves a stop order from `stopOrders` to `openOrders`, collapsing
    /// its type and locking a best-effort initial reservation for
    /// stop-market orders (spec.md §4.3).
    pub fn activate_stop_order(
        state: &mut ExchangeState,
        order_id: &OrderId,
        ts: TimestampMs,
        trade_price: &PriceInt,
    ) -> Result<(), NotFoundError> {
        let symbol = {
            let order = state
                .orders
                .get(order_id)
                .ok_or_else(|| NotFoundError::Order(order_id.clone()))?;
            order.symbol.clone()
        };
        let symbol_config = state
            .symbols
            .get(&symbol)
            .cloned()
            .expect("order symbol always registered");

        state.remove_stop_order(&symbol, order_id);
        {
            let order = state.orders.get_mut(order_id).expect("checked above");
            order.activate_stop(ts);
        }

        let (side, kind, qty) = {
            let order = state.orders.get(order_id).unwrap();
            (order.side, order.kind, order.qty.clone())
        };

        match (side, kind) {
            (Side::Sell, _) => {
                Self::ensure_reservation_capacity(
                    state,
                    order_id,
                    &symbol_config.base,
                    &qty.as_asset_amount(),
                );
            }
            (Side::Buy, OrderKind::Market) => {
                let notional = notional_of(trade_price, &qty, symbol_config.qty_scale);
                let fee = fee_on_notional(&notional, state.fee.taker_bps);
                let estimate = notional
                    .checked_add(&fee)
                    .expect("fee addition cannot overflow")
                    .as_asset_amount();
                Self::ensure_reservation_capacity(state, order_id, &symbol_config.quote, &estimate);
            }
            (Side::Buy, _) => {
                // STOP_LIMIT BUY already reserved notional + maker fee at
                // placement time.
            }
        }

        state.add_open_order(&symbol, order_id.clone());
        Ok(())
    }
}
