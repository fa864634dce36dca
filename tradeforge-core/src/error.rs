//! The engine's error tree. Every fallible operation returns a
//! `thiserror`-derived error; order-level business failures are never part
//! of this tree (`placeOrder` always returns an `Order`, terminal
//! `REJECTED` status carries the `reject_reason` — see `order::Order`).

use thiserror::Error;
use tradeforge_integration::{CheckpointError, ReaderError};
use tradeforge_types::{ArithmeticError, NotFoundError, ValidationError};

/// Failure modes of the accounts service: a missing account/currency, a
/// malformed amount, or a checked-arithmetic violation.
#[derive(Debug, Error)]
pub enum AccountsError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// The top-level error surface of `tradeforge-core`, mirroring
/// `barter-execution::error::ClientError`'s role of wrapping the layered
/// error enums beneath it for a single Result type at the service
/// boundary.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Accounts(#[from] AccountsError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("builder is missing required field '{0}'")]
    BuilderIncomplete(&'static str),
}
