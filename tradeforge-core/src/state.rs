//! The in-memory exchange state container. Plain data plus index-hygiene
//! helpers; the accounts/orders/matching services borrow it rather than
//! own it (spec.md §9).

use crate::account::Account;
use crate::config::{FeeSchedule, SymbolConfig};
use crate::order::Order;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tradeforge_types::{AccountId, IdSequence, OrderId, SymbolId};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExchangeState {
    pub symbols: HashMap<SymbolId, SymbolConfig>,
    pub fee: FeeSchedule,
    pub accounts: HashMap<AccountId, Account>,
    pub orders: HashMap<OrderId, Order>,
    /// Orders with status OPEN/PARTIALLY_FILLED and a non-stop (or
    /// activated) type, indexed by symbol.
    pub open_orders: HashMap<SymbolId, Vec<OrderId>>,
    /// Working stop orders not yet activated, indexed by symbol.
    pub stop_orders: HashMap<SymbolId, Vec<OrderId>>,

    pub account_seq: IdSequence,
    pub order_seq: IdSequence,
    /// Monotonic millisecond counter backing `Clock::Logical`; carried in
    /// the state so a checkpoint/resume continues the same logical clock.
    pub ts_counter: i64,
}

impl ExchangeState {
    pub fn new() -> Self {
        Self {
            account_seq: IdSequence::new(),
            order_seq: IdSequence::new(),
            ..Self::default()
        }
    }

    pub fn register_symbol(&mut self, config: SymbolConfig) {
        self.open_orders.entry(config.id.clone()).or_default();
        self.stop_orders.entry(config.id.clone()).or_default();
        self.symbols.insert(config.id.clone(), config);
    }

    pub fn add_open_order(&mut self, symbol: &SymbolId, order_id: OrderId) {
        self.open_orders.entry(symbol.clone()).or_default().push(order_id);
    }

    pub fn remove_open_order(&mut self, symbol: &SymbolId, order_id: &OrderId) {
        if let Some(list) = self.open_orders.get_mut(symbol) {
            list.retain(|id| id != order_id);
        }
    }

    pub fn add_stop_order(&mut self, symbol: &SymbolId, order_id: OrderId) {
        self.stop_orders.entry(symbol.clone()).or_default().push(order_id);
    }

    pub fn remove_stop_order(&mut self, symbol: &SymbolId, order_id: &OrderId) {
        if let Some(list) = self.stop_orders.get_mut(symbol) {
            list.retain(|id| id != order_id);
        }
    }

    /// Introspection supplementing the corpus' `Orders::num_orders`;
    /// spec.md never forbids read-only counts of the working book.
    pub fn open_order_count(&self, symbol: &SymbolId) -> usize {
        self.open_orders.get(symbol).map_or(0, Vec::len)
    }

    pub fn stop_order_count(&self, symbol: &SymbolId) -> usize {
        self.stop_orders.get(symbol).map_or(0, Vec::len)
    }
}
