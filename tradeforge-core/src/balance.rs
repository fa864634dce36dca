//! Per-(account, currency) balance, and the ledger of them held by an
//! account. Grounded in `barter-execution`'s `ClientBalances`/`Balance`
//! split of a total into `free`/`locked` partitions.

use serde::{Deserialize, Serialize};
use tradeforge_types::{AssetAmount, ArithmeticError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: AssetAmount,
    pub locked: AssetAmount,
}

impl Balance {
    pub fn zero() -> Self {
        Self {
            free: AssetAmount::zero(),
            locked: AssetAmount::zero(),
        }
    }

    pub fn total(&self) -> Result<AssetAmount, ArithmeticError> {
        self.free.checked_add(&self.locked)
    }

    /// Moves `amount` from `free` to `locked`. Returns `false` (balance
    /// unchanged) if `free < amount`.
    pub fn lock(&mut self, amount: &AssetAmount) -> bool {
        match self.free.checked_sub(amount) {
            Ok(remaining_free) => {
                self.free = remaining_free;
                self.locked = self
                    .locked
                    .checked_add(amount)
                    .expect("locked + amount cannot overflow a checked domain value");
                true
            }
            Err(_) => false,
        }
    }

    /// Moves `amount` from `locked` back to `free`.
    pub fn unlock(&mut self, amount: &AssetAmount) -> Result<(), ArithmeticError> {
        self.locked = self.locked.checked_sub(amount)?;
        self.free = self
            .free
            .checked_add(amount)
            .expect("free + amount cannot overflow a checked domain value");
        Ok(())
    }

    /// Decreases `locked` without re-crediting `free` — the outgoing side
    /// of a settled fill.
    pub fn consume_locked(&mut self, amount: &AssetAmount) -> Result<(), ArithmeticError> {
        self.locked = self.locked.checked_sub(amount)?;
        Ok(())
    }

    /// Credits `amount` to `free` directly — a deposit, or the incoming
    /// side of a settled fill.
    pub fn credit_free(&mut self, amount: &AssetAmount) {
        self.free = self
            .free
            .checked_add(amount)
            .expect("free + amount cannot overflow a checked domain value");
    }

    /// Debits `amount` from `free` directly (a fee paid out of the free
    /// bucket rather than the locked reservation).
    pub fn debit_free(&mut self, amount: &AssetAmount) -> Result<(), ArithmeticError> {
        self.free = self.free.checked_sub(amount)?;
        Ok(())
    }
}
