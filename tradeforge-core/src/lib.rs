//! The TradeForge simulation engine: fixed-point exchange state, the
//! orders/accounts services that mutate it, the deterministic matching
//! loop, the replay driver and its clocks, cursor readers over trade/depth
//! archives, the real-time book mirror, and checkpointing.
//!
//! Nothing here frames an HTTP/WebSocket boundary, parses CLI arguments,
//! or talks to a live exchange feed — those are external collaborators
//! (spec.md §1) that would sit on top of the services this crate exports.

#![forbid(unsafe_code)]
#![warn(
    unused,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::cognitive_complexity
)]
#![allow(clippy::type_complexity)]

pub mod account;
pub mod accounts_service;
pub mod balance;
pub mod book;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod matching;
pub mod order;
pub mod orders_service;
pub mod reader;
pub mod replay;
pub mod state;

pub use account::Account;
pub use accounts_service::AccountsService;
pub use balance::Balance;
pub use book::{BookError, BookSnapshot, DepthDiff, OrderBookMirror};
pub use checkpoint::{
    make_checkpoint_v1, resume_from_checkpoint, restore_engine_from_snapshot, save_checkpoint,
    CheckpointCursors, CheckpointEngine, CheckpointMeta, CheckpointV1, ResumeInputs,
};
pub use checkpoint::{deserialize_exchange_state, load_checkpoint, CheckpointMerge};
pub use clock::{AcceleratedClock, Clock, LogicalClock, WallClock};
pub use config::{FeeSchedule, SymbolConfig};
pub use error::{AccountsError, ExecutionError};
pub use matching::{ExecutionReport, MatchingConfig, MatchingEngine, OrderPatch, TradeEvent};
pub use order::{Fees, Fill, Order, Reserved};
pub use orders_service::{OrdersService, PlaceOrderInput};
pub use reader::{Cursor, DepthReader, DepthRecord, ParseRecord, ReaderError, TimeFilter, TradeReader, TradeRecord};
pub use replay::{
    run_replay, AutoCheckpointConfig, ReplayController, ReplayCursors, ReplayLimits, ReplayProgress,
};
pub use state::ExchangeState;
