//! The replay driver (spec.md §4.6): paces a merged trade/depth timeline
//! through a simulated clock, drives the matching loop, honours pause and
//! limits, and invokes an auto-checkpoint cadence. Grounded in
//! `barter::engine::run`'s event-pull/clock-tick/process loop shape,
//! generalised to add pacing against a caller-chosen `Clock` and the
//! checkpoint cadence this engine needs.

use crate::clock::Clock;
use crate::error::{AccountsError, ExecutionError};
use crate::matching::{ExecutionReport, MatchingConfig, MatchingEngine, TradeEvent};
use crate::reader::{Cursor as ReaderCursor, DepthReader, TradeReader};
use crate::state::ExchangeState;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::warn;
use tradeforge_integration::{CheckpointError, DeterministicMerge, Merged, SourceTag};
use tradeforge_types::{NotFoundError, SymbolId, TimestampMs};

/// Pause/resume handle shared between the driver and an external
/// controller (e.g. a UI pause button).
#[derive(Debug, Default)]
pub struct ReplayController {
    paused: AtomicBool,
    notify: Notify,
}

impl ReplayController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub async fn wait_until_resumed(&self) {
        while self.is_paused() {
            self.notify.notified().await;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayLimits {
    pub max_events: Option<u64>,
    pub max_sim_time_ms: Option<i64>,
    pub max_wall_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayProgress {
    pub events_out: u64,
    pub wall_start_ms: i64,
    pub wall_last_ms: i64,
    pub sim_start_ts: Option<TimestampMs>,
    pub sim_last_ts: Option<TimestampMs>,
}

/// The cursor/tie-break state a checkpoint needs to capture, handed to the
/// caller's `on_checkpoint` hook.
#[derive(Debug, Clone)]
pub struct ReplayCursors {
    pub trades: ReaderCursor,
    pub depth: ReaderCursor,
    pub next_source_on_equal_ts: Option<SourceTag>,
}

pub struct AutoCheckpointConfig<'a> {
    pub cp_interval_events: Option<u64>,
    pub cp_interval_wall_ms: Option<i64>,
    /// Builds and persists a checkpoint. Errors are logged and the replay
    /// continues (spec.md §4.6).
    pub on_checkpoint: &'a mut dyn FnMut(&ExchangeState, &ReplayCursors) -> Result<(), CheckpointError>,
}

fn to_execution_error(err: NotFoundError) -> ExecutionError {
    ExecutionError::Accounts(AccountsError::NotFound(err))
}

/// Runs the merged `trades`/`depth` timeline to completion or to the
/// earliest limit, pacing consumption through `clock` and driving
/// `MatchingEngine::process_trade` for every trade event. Depth events
/// update no historical state (spec.md §4.5 step 1); a real-time book
/// mirror is the realtime adapter's concern, out of scope here.
#[allow(clippy::too_many_arguments)]
pub async fn run_replay<C: Clock>(
    state: &mut ExchangeState,
    symbol: SymbolId,
    matching_config: &MatchingConfig,
    mut merge: DeterministicMerge<TradeReader, DepthReader>,
    mut clock: C,
    limits: Option<ReplayLimits>,
    controller: Option<&ReplayController>,
    mut auto_cp: Option<AutoCheckpointConfig<'_>>,
    mut on_event: Option<&mut dyn FnMut(&ExecutionReport)>,
) -> Result<ReplayProgress, ExecutionError> {
    let mut wall_start_ms = clock.now();
    let mut first_event_ts: Option<TimestampMs> = None;
    let mut events_out: u64 = 0;
    let mut sim_last_ts: Option<TimestampMs> = None;
    let mut last_cp_events: u64 = 0;
    let mut last_cp_wall_ms = wall_start_ms;

    loop {
        if limit_reached(&limits, events_out, first_event_ts, sim_last_ts, wall_start_ms, clock.now()) {
            break;
        }

        if let Some(controller) = controller {
            if controller.is_paused() {
                controller.wait_until_resumed().await;
            }
        }

        let Some(next) = merge.next().await? else {
            break;
        };

        let ts = match &next {
            Merged::Left(trade) => trade.ts,
            Merged::Right(depth) => depth.ts,
        };
        if first_event_ts.is_none() {
            first_event_ts = Some(ts);
            wall_start_ms = clock.now();
        }
        let sim_elapsed = ts - first_event_ts.expect("just set above");
        clock.tick_until(wall_start_ms + sim_elapsed).await;

        match next {
            Merged::Left(trade) => {
                let event = TradeEvent {
                    ts: trade.ts,
                    symbol: symbol.clone(),
                    price: trade.price,
                    qty: trade.qty,
                    aggressor: trade.aggressor,
                    trade_ref: trade.trade_ref,
                };
                let reports =
                    MatchingEngine::process_trade(state, matching_config, &event).map_err(to_execution_error)?;
                if matching_config.processing_latency_ms > 0 {
                    clock
                        .tick_until(wall_start_ms + sim_elapsed + matching_config.processing_latency_ms)
                        .await;
                }
                if let Some(cb) = on_event.as_deref_mut() {
                    for report in &reports {
                        cb(report);
                    }
                }
            }
            Merged::Right(_depth) => {
                // Historical matching ignores depth; a real-time book
                // mirror would be updated here by the realtime adapter.
            }
        }

        events_out += 1;
        sim_last_ts = Some(ts);

        if let Some(auto) = auto_cp.as_mut() {
            let now_wall = clock.now();
            let events_due = auto
                .cp_interval_events
                .is_some_and(|n| events_out - last_cp_events >= n);
            let wall_due = auto
                .cp_interval_wall_ms
                .is_some_and(|ms| now_wall - last_cp_wall_ms >= ms);
            if events_due || wall_due {
                let cursors = ReplayCursors {
                    trades: merge.left().current_cursor(),
                    depth: merge.right().current_cursor(),
                    next_source_on_equal_ts: merge.next_source_on_equal_ts(),
                };
                if let Err(e) = (auto.on_checkpoint)(state, &cursors) {
                    warn!(error = %e, "auto-checkpoint failed, continuing replay");
                }
                last_cp_events = events_out;
                last_cp_wall_ms = now_wall;
            }
        }
    }

    merge.close().await;

    Ok(ReplayProgress {
        events_out,
        wall_start_ms,
        wall_last_ms: clock.now(),
        sim_start_ts: first_event_ts,
        sim_last_ts,
    })
}

fn limit_reached(
    limits: &Option<ReplayLimits>,
    events_out: u64,
    first_event_ts: Option<TimestampMs>,
    sim_last_ts: Option<TimestampMs>,
    wall_start_ms: i64,
    wall_now_ms: i64,
) -> bool {
    let Some(limits) = limits else {
        return false;
    };
    if let Some(max_events) = limits.max_events {
        if events_out >= max_events {
            return true;
        }
    }
    if let (Some(max_sim), Some(first_ts), Some(last_ts)) =
        (limits.max_sim_time_ms, first_event_ts, sim_last_ts)
    {
        if last_ts - first_ts >= max_sim {
            return true;
        }
    }
    if let Some(max_wall) = limits.max_wall_time_ms {
        if wall_now_ms - wall_start_ms >= max_wall {
            return true;
        }
    }
    false
}
