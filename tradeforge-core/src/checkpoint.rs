//! Checkpoint v1: snapshot and restore of exchange state plus the engine
//! indices and reader cursors needed to resume a replay bit-identically
//! (spec.md §4.9). Grounded in `barter-execution`'s account-snapshot
//! persistence shape, generalised to also carry reader cursors and the
//! merge tie-break hint this engine's resumability needs.

use crate::clock::unix_ms_now;
use crate::reader::{Cursor as ReaderCursor, DepthReader, TimeFilter, TradeReader};
use crate::state::ExchangeState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tradeforge_integration::{CheckpointError, DeterministicMerge, SourceTag};
use tradeforge_types::{OrderId, SymbolId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub symbol: SymbolId,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointCursors {
    pub trades: Option<ReaderCursor>,
    pub depth: Option<ReaderCursor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMerge {
    pub next_source_on_equal_ts: Option<SourceTag>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointEngine {
    pub open_order_ids: HashMap<SymbolId, Vec<OrderId>>,
    pub stop_order_ids: HashMap<SymbolId, Vec<OrderId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointV1 {
    pub version: u64,
    pub created_at_ms: i64,
    pub meta: CheckpointMeta,
    pub cursors: CheckpointCursors,
    pub merge: CheckpointMerge,
    pub engine: CheckpointEngine,
    /// The serialized `ExchangeState`, kept as a `Value` rather than a
    /// live struct so a checkpoint can be inspected/validated before
    /// committing to deserializing it (`deserialize_exchange_state` does
    /// that commit).
    pub state: serde_json::Value,
}

/// Builds a v1 checkpoint from the live state and the cursor/tie-break
/// bookkeeping the caller (typically the replay driver) supplies.
pub fn make_checkpoint_v1(
    symbol: SymbolId,
    state: &ExchangeState,
    cursors: CheckpointCursors,
    next_source_on_equal_ts: Option<SourceTag>,
    note: Option<String>,
) -> Result<CheckpointV1, CheckpointError> {
    Ok(CheckpointV1 {
        version: 1,
        created_at_ms: unix_ms_now(),
        meta: CheckpointMeta { symbol, note },
        cursors,
        merge: CheckpointMerge {
            next_source_on_equal_ts,
        },
        engine: CheckpointEngine {
            open_order_ids: state.open_orders.clone(),
            stop_order_ids: state.stop_orders.clone(),
        },
        state: serde_json::to_value(state)?,
    })
}

/// Writes `cp` as JSON with deterministic (sorted) key ordering and big
/// integers as decimal strings. `serde_json::Value`'s map is a `BTreeMap`
/// in this workspace (the `preserve_order` feature is never enabled), so
/// round-tripping through `Value` is sufficient to get sorted keys.
pub fn save_checkpoint(path: &Path, cp: &CheckpointV1) -> Result<(), CheckpointError> {
    let value = serde_json::to_value(cp)?;
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &value)?;
    Ok(())
}

/// Reads and structurally validates a checkpoint before attempting the
/// full typed deserialization, so malformed input fails with a specific
/// `SchemaViolation`/`UnsupportedVersion` rather than a generic serde
/// error.
pub fn load_checkpoint(path: &Path) -> Result<CheckpointV1, CheckpointError> {
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    validate_checkpoint_shape(&value)?;
    let cp: CheckpointV1 = serde_json::from_value(value)?;
    Ok(cp)
}

fn violation(reason: impl Into<String>) -> CheckpointError {
    CheckpointError::SchemaViolation(reason.into())
}

fn validate_checkpoint_shape(value: &serde_json::Value) -> Result<(), CheckpointError> {
    let root = value
        .as_object()
        .ok_or_else(|| violation("checkpoint root must be a JSON object"))?;

    let version = root
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| violation("missing or non-integer 'version'"))?;
    if version != 1 {
        return Err(CheckpointError::UnsupportedVersion(version));
    }

    for key in ["created_at_ms", "meta", "cursors", "merge", "engine", "state"] {
        if !root.contains_key(key) {
            return Err(violation(format!("missing required field '{key}'")));
        }
    }

    let meta = root
        .get("meta")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| violation("'meta' must be an object"))?;
    if !meta.contains_key("symbol") {
        return Err(violation("'meta.symbol' is required"));
    }

    let engine = root
        .get("engine")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| violation("'engine' must be an object"))?;
    for key in ["open_order_ids", "stop_order_ids"] {
        if !engine.contains_key(key) {
            return Err(violation(format!("missing required field 'engine.{key}'")));
        }
    }

    if let Some(cursors) = root.get("cursors").and_then(serde_json::Value::as_object) {
        for side in ["trades", "depth"] {
            let Some(cursor) = cursors.get(side) else {
                continue;
            };
            if cursor.is_null() {
                continue;
            }
            let record_index = cursor.get("record_index").and_then(serde_json::Value::as_i64);
            match record_index {
                Some(n) if n >= 0 => {}
                _ => {
                    return Err(violation(format!(
                        "cursors.{side}.record_index must be a non-negative integer"
                    )))
                }
            }
        }
    }

    Ok(())
}

/// Commits a checkpoint's serialized state blob into a live `ExchangeState`.
pub fn deserialize_exchange_state(serialized: serde_json::Value) -> Result<ExchangeState, CheckpointError> {
    Ok(serde_json::from_value(serialized)?)
}

/// Rebuilds `open_orders`/`stop_orders` from the id lists captured at
/// checkpoint time, requiring every referenced id to already be present in
/// `state.orders`.
pub fn restore_engine_from_snapshot(state: &mut ExchangeState, engine: &CheckpointEngine) -> Result<(), CheckpointError> {
    for (symbol, ids) in &engine.open_order_ids {
        for id in ids {
            if !state.orders.contains_key(id) {
                return Err(CheckpointError::MissingOrderId(id.as_str().to_string()));
            }
        }
        state.open_orders.insert(symbol.clone(), ids.clone());
    }
    for (symbol, ids) in &engine.stop_order_ids {
        for id in ids {
            if !state.orders.contains_key(id) {
                return Err(CheckpointError::MissingOrderId(id.as_str().to_string()));
            }
        }
        state.stop_orders.insert(symbol.clone(), ids.clone());
    }
    Ok(())
}

/// What the caller must supply to rebuild readers on resume: the full file
/// lists (the checkpoint only remembers a position within them) and the
/// scale/filter configuration the original run used.
#[derive(Debug, Clone)]
pub struct ResumeInputs {
    pub trades_files: Vec<String>,
    pub depth_files: Vec<String>,
    pub price_scale: u32,
    pub qty_scale: u32,
    pub time_filter: TimeFilter,
    pub assert_monotonic: bool,
    pub prefer_right_on_equal_ts: bool,
}

/// Restores state and engine indices, builds readers seeked to the saved
/// cursors, and composes the merge with the saved tie-break hint so output
/// continues bit-identically from where the checkpoint was taken.
pub fn resume_from_checkpoint(
    cp: CheckpointV1,
    inputs: ResumeInputs,
) -> Result<(ExchangeState, DeterministicMerge<TradeReader, DepthReader>), CheckpointError> {
    let mut state = deserialize_exchange_state(cp.state)?;
    restore_engine_from_snapshot(&mut state, &cp.engine)?;

    let trades = TradeReader::new(
        inputs.trades_files,
        inputs.price_scale,
        inputs.qty_scale,
        inputs.time_filter,
        cp.cursors.trades,
        inputs.assert_monotonic,
    );
    let depth = DepthReader::new(
        inputs.depth_files,
        inputs.price_scale,
        inputs.qty_scale,
        inputs.time_filter,
        cp.cursors.depth,
        inputs.assert_monotonic,
    );
    let mut merge = DeterministicMerge::new(trades, depth, inputs.prefer_right_on_equal_ts);
    merge.set_next_source_on_equal_ts(cp.merge.next_source_on_equal_ts);

    Ok((state, merge))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts_service::AccountsService;
    use crate::config::SymbolConfig;
    use num_bigint::BigInt;
    use tradeforge_types::{AssetAmount, IdSequence};

    struct TempDir(std::path::PathBuf);
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let mut path = std::env::temp_dir();
        path.push(format!("tradeforge-checkpoint-test-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&path);
        TempDir(path)
    }

    fn sample_state() -> (ExchangeState, SymbolId) {
        let mut state = ExchangeState::new();
        let symbol = SymbolId::from_seq(1);
        state.register_symbol(SymbolConfig::new(symbol.clone(), "BTC", "USDT", 2, 3));
        let account = AccountsService::create_account(&IdSequence::new(), None);
        let account_id = account.id.clone();
        state.accounts.insert(account_id.clone(), account);
        AccountsService::deposit(
            &mut state.accounts,
            &account_id,
            "USDT",
            &AssetAmount::from_raw(BigInt::from(1_000_00)),
        )
        .unwrap();
        (state, symbol)
    }

    #[test]
    fn test_save_then_load_round_trips_state() {
        let dir = tempdir();
        let (state, symbol) = sample_state();
        let cp = make_checkpoint_v1(
            symbol.clone(),
            &state,
            CheckpointCursors {
                trades: Some(ReaderCursor {
                    file: "trades.jsonl".to_string(),
                    entry: None,
                    record_index: 5,
                }),
                depth: None,
            },
            Some(SourceTag::Left),
            Some("unit test".to_string()),
        )
        .unwrap();

        let path = dir.0.join("cp.json");
        save_checkpoint(&path, &cp).unwrap();
        let loaded = load_checkpoint(&path).unwrap();

        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.meta.symbol, symbol);
        assert_eq!(loaded.cursors.trades.as_ref().unwrap().record_index, 5);
        assert!(matches!(loaded.merge.next_source_on_equal_ts, Some(SourceTag::Left)));

        let mut restored = deserialize_exchange_state(loaded.state).unwrap();
        restore_engine_from_snapshot(&mut restored, &loaded.engine).unwrap();
        assert_eq!(restored.symbols.len(), state.symbols.len());
        assert_eq!(restored.accounts.len(), state.accounts.len());
    }

    #[test]
    fn test_restore_engine_rejects_missing_order_id() {
        let (state, _symbol) = sample_state();
        let mut restored = state;
        let symbol = SymbolId::from_seq(1);
        let mut open_order_ids = HashMap::new();
        open_order_ids.insert(symbol, vec![OrderId::from_seq(999)]);
        let engine = CheckpointEngine {
            open_order_ids,
            stop_order_ids: HashMap::new(),
        };

        let err = restore_engine_from_snapshot(&mut restored, &engine).unwrap_err();
        assert!(matches!(err, CheckpointError::MissingOrderId(_)));
    }

    #[test]
    fn test_load_checkpoint_rejects_unsupported_version() {
        let dir = tempdir();
        let path = dir.0.join("bad_version.json");
        std::fs::write(&path, r#"{"version": 2, "created_at_ms": 1, "meta": {"symbol": "sym-1"}, "cursors": {}, "merge": {}, "engine": {"open_order_ids": {}, "stop_order_ids": {}}, "state": {}}"#).unwrap();

        let err = load_checkpoint(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_load_checkpoint_rejects_missing_required_field() {
        let dir = tempdir();
        let path = dir.0.join("missing_field.json");
        std::fs::write(&path, r#"{"version": 1, "meta": {"symbol": "sym-1"}}"#).unwrap();

        let err = load_checkpoint(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::SchemaViolation(_)));
    }
}
