//! Concrete scenario 5 / invariant "replay idempotence" (spec.md §8):
//! running to `maxEvents=2`, checkpointing, then resuming to completion
//! must yield the same final serialized state as running to completion in
//! one go.

mod util;

use tradeforge_core::checkpoint::{
    make_checkpoint_v1, resume_from_checkpoint, CheckpointCursors, CheckpointV1, ResumeInputs,
};
use tradeforge_core::clock::LogicalClock;
use tradeforge_core::matching::MatchingConfig;
use tradeforge_core::orders_service::{OrdersService, PlaceOrderInput};
use tradeforge_core::reader::{DepthReader, TimeFilter, TradeReader};
use tradeforge_core::replay::{run_replay, AutoCheckpointConfig, ReplayCursors, ReplayLimits};
use tradeforge_integration::DeterministicMerge;
use tradeforge_types::{OrderKind, PriceInt, QtyInt, Side, TimeInForce};

fn fixture_paths(dir: &std::path::Path) -> (String, String) {
    let trades_path = util::write_jsonl(
        dir,
        "trades.jsonl",
        &[
            r#"{"ts": 1, "price": "99.00", "qty": "0.300", "aggressor": "SELL"}"#,
            r#"{"ts": 2, "price": "101.00", "qty": "0.500", "aggressor": "BUY"}"#,
            r#"{"ts": 3, "price": "100.00", "qty": "0.700", "aggressor": "SELL"}"#,
        ],
    );
    let depth_path = util::write_jsonl(dir, "depth.jsonl", &[r#"{"ts": 1, "bids": [], "asks": []}"#]);
    (trades_path, depth_path)
}

fn place_resting_buy(state: &mut tradeforge_core::ExchangeState, symbol: &tradeforge_types::SymbolId, account_id: &tradeforge_types::AccountId) {
    OrdersService::place_order(
        state,
        0,
        PlaceOrderInput {
            account_id: account_id.clone(),
            symbol: symbol.clone(),
            kind: OrderKind::Limit,
            side: Side::Buy,
            tif: TimeInForce::Gtc,
            price: Some(PriceInt::from_decimal_str("100.00", 2).unwrap()),
            qty: QtyInt::from_decimal_str("1.000", 3).unwrap(),
            trigger_price: None,
            trigger_direction: None,
        },
    )
    .unwrap();
}

#[tokio::test]
async fn test_replay_then_resume_matches_uninterrupted_run() {
    let dir = util::tempdir("replay-resume");
    let (trades_path, depth_path) = fixture_paths(&dir.0);

    // (a) run to completion in one go.
    let (mut full_state, symbol, account_id) = util::state_with_funded_account(2, 3, 10, 10, "200.00");
    place_resting_buy(&mut full_state, &symbol, &account_id);
    let full_trades = TradeReader::new(vec![trades_path.clone()], 2, 3, TimeFilter::default(), None, true);
    let full_depth = DepthReader::new(vec![depth_path.clone()], 2, 3, TimeFilter::default(), None, true);
    let full_merge = DeterministicMerge::new(full_trades, full_depth, true);
    let full_progress = run_replay(
        &mut full_state,
        symbol.clone(),
        &MatchingConfig::default(),
        full_merge,
        LogicalClock::new(),
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(full_progress.events_out, 4);

    // (b) run to maxEvents=2, checkpoint, resume to completion.
    let (mut half_state, symbol2, account_id2) = util::state_with_funded_account(2, 3, 10, 10, "200.00");
    assert_eq!(account_id2, account_id, "identical setup must mint identical ids");
    place_resting_buy(&mut half_state, &symbol2, &account_id2);
    let half_trades = TradeReader::new(vec![trades_path.clone()], 2, 3, TimeFilter::default(), None, true);
    let half_depth = DepthReader::new(vec![depth_path.clone()], 2, 3, TimeFilter::default(), None, true);
    let half_merge = DeterministicMerge::new(half_trades, half_depth, true);

    let mut captured: Option<CheckpointV1> = None;
    let mut on_checkpoint = |state: &tradeforge_core::ExchangeState, cursors: &ReplayCursors| {
        captured = Some(
            make_checkpoint_v1(
                symbol2.clone(),
                state,
                CheckpointCursors {
                    trades: Some(cursors.trades.clone()),
                    depth: Some(cursors.depth.clone()),
                },
                cursors.next_source_on_equal_ts,
                None,
            )
            .unwrap(),
        );
        Ok(())
    };
    let auto_cp = AutoCheckpointConfig {
        cp_interval_events: Some(2),
        cp_interval_wall_ms: None,
        on_checkpoint: &mut on_checkpoint,
    };

    let half_progress = run_replay(
        &mut half_state,
        symbol2.clone(),
        &MatchingConfig::default(),
        half_merge,
        LogicalClock::new(),
        Some(ReplayLimits {
            max_events: Some(2),
            max_sim_time_ms: None,
            max_wall_time_ms: None,
        }),
        None,
        Some(auto_cp),
        None,
    )
    .await
    .unwrap();
    assert_eq!(half_progress.events_out, 2);

    let cp = captured.expect("auto-checkpoint must have fired at event 2");

    let (mut resumed_state, resumed_merge) = resume_from_checkpoint(
        cp,
        ResumeInputs {
            trades_files: vec![trades_path],
            depth_files: vec![depth_path],
            price_scale: 2,
            qty_scale: 3,
            time_filter: TimeFilter::default(),
            assert_monotonic: true,
            prefer_right_on_equal_ts: true,
        },
    )
    .unwrap();

    let resume_progress = run_replay(
        &mut resumed_state,
        symbol2,
        &MatchingConfig::default(),
        resumed_merge,
        LogicalClock::new(),
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(resume_progress.events_out, 2, "two remaining events after resume");

    let full_value = serde_json::to_value(&full_state).unwrap();
    let resumed_value = serde_json::to_value(&resumed_state).unwrap();
    assert_eq!(full_value, resumed_value, "resumed state must match the uninterrupted run byte-for-byte");
}
