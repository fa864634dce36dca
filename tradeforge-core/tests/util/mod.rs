//! Shared fixture helpers for the integration scenarios in `tests/`,
//! mirroring `barter-execution/tests/util/mod.rs`'s builder-helper style.

use std::fs::File;
use std::io::Write;
use tradeforge_core::{AccountsService, ExchangeState, FeeSchedule, SymbolConfig};
use tradeforge_types::{AccountId, AssetAmount, IdSequence, SymbolId};

/// A directory under the OS temp dir, removed on drop.
pub struct TempDir(pub std::path::PathBuf);

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn tempdir(tag: &str) -> TempDir {
    let mut path = std::env::temp_dir();
    path.push(format!("tradeforge-it-{tag}-{}", std::process::id()));
    let _ = std::fs::create_dir_all(&path);
    TempDir(path)
}

pub fn write_jsonl(dir: &std::path::Path, name: &str, lines: &[&str]) -> String {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path.to_str().unwrap().to_string()
}

/// A single-symbol `BTCUSDT`-shaped state with one funded account.
pub fn state_with_funded_account(
    price_scale: u32,
    qty_scale: u32,
    maker_bps: u32,
    taker_bps: u32,
    deposit: &str,
) -> (ExchangeState, SymbolId, AccountId) {
    let mut state = ExchangeState::new();
    let symbol = SymbolId::from_seq(1);
    state.register_symbol(SymbolConfig::new(symbol.clone(), "BTC", "USDT", price_scale, qty_scale));
    state.fee = FeeSchedule::new(maker_bps, taker_bps);

    let account = AccountsService::create_account(&IdSequence::new(), None);
    let account_id = account.id.clone();
    state.accounts.insert(account_id.clone(), account);

    AccountsService::deposit(
        &mut state.accounts,
        &account_id,
        "USDT",
        &AssetAmount::from_decimal_str(deposit, price_scale).expect("valid deposit literal"),
    )
    .unwrap();

    (state, symbol, account_id)
}
