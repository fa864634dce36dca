use crate::balance::Balance;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tradeforge_types::AccountId;

/// An account is created once by the accounts service and lives for the
/// entire run; it is never destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub api_key: Option<String>,
    pub balances: HashMap<String, Balance>,
}

impl Account {
    pub fn new(id: AccountId, api_key: Option<String>) -> Self {
        Self {
            id,
            api_key,
            balances: HashMap::new(),
        }
    }

    pub fn balance(&self, currency: &str) -> Option<&Balance> {
        self.balances.get(currency)
    }

    pub fn balance_mut(&mut self, currency: &str) -> &mut Balance {
        self.balances
            .entry(currency.to_string())
            .or_insert_with(Balance::zero)
    }
}
