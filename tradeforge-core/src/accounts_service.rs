//! Balance ledger operations. Grounded in
//! `barter-execution/src/simulated/exchange/account/balance.rs`'s
//! `ClientBalances` methods, generalised from a fixed base/quote pair to an
//! arbitrary currency map.

use crate::account::Account;
use crate::balance::Balance;
use crate::error::AccountsError;
use std::collections::HashMap;
use tradeforge_types::{AccountId, AssetAmount, IdSequence, NotFoundError};

/// Owns no state of its own; operates on the `accounts` map living in
/// `ExchangeState` (spec.md §9: "services borrow the state, not own it").
pub struct AccountsService;

impl AccountsService {
    /// Allocates a fresh id from `account_seq` and an empty balance map.
    pub fn create_account(account_seq: &IdSequence, api_key: Option<String>) -> Account {
        let id = AccountId::from_seq(account_seq.next());
        Account::new(id, api_key)
    }

    pub fn deposit(
        accounts: &mut HashMap<AccountId, Account>,
        account_id: &AccountId,
        currency: &str,
        amount: &AssetAmount,
    ) -> Result<Balance, AccountsError> {
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        let balance = account.balance_mut(currency);
        balance.credit_free(amount);
        Ok(balance.clone())
    }

    /// Atomically moves `amount` from `free` to `locked`. Returns `false`
    /// (no mutation) if `free < amount`.
    pub fn lock(
        accounts: &mut HashMap<AccountId, Account>,
        account_id: &AccountId,
        currency: &str,
        amount: &AssetAmount,
    ) -> Result<bool, AccountsError> {
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        Ok(account.balance_mut(currency).lock(amount))
    }

    pub fn unlock(
        accounts: &mut HashMap<AccountId, Account>,
        account_id: &AccountId,
        currency: &str,
        amount: &AssetAmount,
    ) -> Result<(), AccountsError> {
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        account.balance_mut(currency).unlock(amount)?;
        Ok(())
    }

    pub fn consume_locked(
        accounts: &mut HashMap<AccountId, Account>,
        account_id: &AccountId,
        currency: &str,
        amount: &AssetAmount,
    ) -> Result<(), AccountsError> {
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        account.balance_mut(currency).consume_locked(amount)?;
        Ok(())
    }

    /// Subtracts a trade fee from either the locked reservation or the
    /// free bucket, matching which side of the fill is settling it.
    pub fn apply_trade_fee(
        accounts: &mut HashMap<AccountId, Account>,
        account_id: &AccountId,
        currency: &str,
        fee: &AssetAmount,
        prefer_locked: bool,
    ) -> Result<(), AccountsError> {
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        let balance = account.balance_mut(currency);
        if prefer_locked {
            balance.consume_locked(fee)?;
        } else {
            balance.debit_free(fee)?;
        }
        Ok(())
    }

    /// Deep-copied view for external readers.
    pub fn balances_snapshot(
        accounts: &HashMap<AccountId, Account>,
        account_id: &AccountId,
    ) -> Result<HashMap<String, Balance>, AccountsError> {
        let account = accounts
            .get(account_id)
            .ok_or_else(|| NotFoundError::Account(account_id.clone()))?;
        Ok(account.balances.clone())
    }
}
