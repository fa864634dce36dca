use crate::id::{AccountId, OrderId, SymbolId};
use thiserror::Error;

/// Looked up an id that the caller should have already validated exists.
/// Per spec.md §7 this is a caller-bug-class failure, not a business
/// outcome — it is never returned from `place_order`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("unknown account {0}")]
    Account(AccountId),
    #[error("unknown order {0}")]
    Order(OrderId),
    #[error("unknown symbol {0}")]
    Symbol(SymbolId),
}
