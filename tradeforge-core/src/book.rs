//! Real-time L2 order-book mirror (spec.md §4.8). Used for market-order
//! liquidity planning by the real-time adapter; the historical matching
//! loop in `matching.rs` only ever looks at trades.

use std::collections::BTreeMap;
use thiserror::Error;
use tradeforge_types::{PriceInt, QtyInt, TimestampMs};

#[derive(Debug, Clone)]
pub struct DepthDiff {
    pub ts: TimestampMs,
    pub seq: u64,
    pub bids: Vec<(PriceInt, QtyInt)>,
    pub asks: Vec<(PriceInt, QtyInt)>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("depth diff seq {incoming} regresses behind current seq {current}")]
    SequenceRegression { current: u64, incoming: u64 },
    #[error("depth diff ts {incoming} regresses behind current ts {current}")]
    TimestampRegression {
        current: TimestampMs,
        incoming: TimestampMs,
    },
}

#[derive(Debug, Clone)]
pub struct BookSnapshot {
    /// Descending by price.
    pub bids: Vec<(PriceInt, QtyInt)>,
    /// Ascending by price.
    pub asks: Vec<(PriceInt, QtyInt)>,
    pub best_bid: Option<PriceInt>,
    pub best_ask: Option<PriceInt>,
    pub seq: u64,
    pub ts: TimestampMs,
}

/// Sorted bid/ask sides keyed by price. `BTreeMap`'s natural iteration
/// order gives ascending asks directly and descending bids via `.rev()`.
#[derive(Debug, Default)]
pub struct OrderBookMirror {
    bids: BTreeMap<PriceInt, QtyInt>,
    asks: BTreeMap<PriceInt, QtyInt>,
    seq: Option<u64>,
    ts: Option<TimestampMs>,
}

impl OrderBookMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects diffs whose `seq` or `ts` regress relative to the last
    /// applied diff. A level with `qty == 0` deletes that price.
    pub fn apply_diff(&mut self, diff: &DepthDiff) -> Result<(), BookError> {
        if let Some(current) = self.seq {
            if diff.seq < current {
                return Err(BookError::SequenceRegression {
                    current,
                    incoming: diff.seq,
                });
            }
        }
        if let Some(current) = self.ts {
            if diff.ts < current {
                return Err(BookError::TimestampRegression {
                    current,
                    incoming: diff.ts,
                });
            }
        }

        for (price, qty) in &diff.bids {
            apply_level(&mut self.bids, price, qty);
        }
        for (price, qty) in &diff.asks {
            apply_level(&mut self.asks, price, qty);
        }

        self.seq = Some(diff.seq);
        self.ts = Some(diff.ts);
        Ok(())
    }

    pub fn get_snapshot(&self, depth: Option<usize>) -> BookSnapshot {
        let bids: Vec<_> = self
            .bids
            .iter()
            .rev()
            .take(depth.unwrap_or(usize::MAX))
            .map(|(p, q)| (p.clone(), q.clone()))
            .collect();
        let asks: Vec<_> = self
            .asks
            .iter()
            .take(depth.unwrap_or(usize::MAX))
            .map(|(p, q)| (p.clone(), q.clone()))
            .collect();
        let best_bid = self.bids.keys().next_back().cloned();
        let best_ask = self.asks.keys().next().cloned();

        BookSnapshot {
            bids,
            asks,
            best_bid,
            best_ask,
            seq: self.seq.unwrap_or(0),
            ts: self.ts.unwrap_or(0),
        }
    }
}

fn apply_level(side: &mut BTreeMap<PriceInt, QtyInt>, price: &PriceInt, qty: &QtyInt) {
    if qty.is_zero() {
        side.remove(price);
    } else {
        side.insert(price.clone(), qty.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn price(raw: i64) -> PriceInt {
        PriceInt::from_raw(BigInt::from(raw))
    }
    fn qty(raw: i64) -> QtyInt {
        QtyInt::from_raw(BigInt::from(raw))
    }

    #[test]
    fn test_apply_diff_sets_and_deletes_levels() {
        let mut book = OrderBookMirror::new();
        book.apply_diff(&DepthDiff {
            ts: 1,
            seq: 1,
            bids: vec![(price(100), qty(5)), (price(99), qty(3))],
            asks: vec![(price(101), qty(4))],
        })
        .unwrap();

        let snapshot = book.get_snapshot(None);
        assert_eq!(snapshot.bids, vec![(price(100), qty(5)), (price(99), qty(3))]);
        assert_eq!(snapshot.best_bid, Some(price(100)));
        assert_eq!(snapshot.best_ask, Some(price(101)));

        book.apply_diff(&DepthDiff {
            ts: 2,
            seq: 2,
            bids: vec![(price(100), qty(0))],
            asks: vec![],
        })
        .unwrap();
        let snapshot = book.get_snapshot(None);
        assert_eq!(snapshot.bids, vec![(price(99), qty(3))]);
        assert_eq!(snapshot.best_bid, Some(price(99)));
    }

    #[test]
    fn test_apply_diff_rejects_regression() {
        struct TestCase {
            first: DepthDiff,
            second: DepthDiff,
            expect_err: bool,
        }

        let tests = vec![
            TestCase {
                first: DepthDiff {
                    ts: 10,
                    seq: 10,
                    bids: vec![],
                    asks: vec![],
                },
                second: DepthDiff {
                    ts: 11,
                    seq: 9,
                    bids: vec![],
                    asks: vec![],
                },
                expect_err: true,
            },
            TestCase {
                first: DepthDiff {
                    ts: 10,
                    seq: 10,
                    bids: vec![],
                    asks: vec![],
                },
                second: DepthDiff {
                    ts: 9,
                    seq: 11,
                    bids: vec![],
                    asks: vec![],
                },
                expect_err: true,
            },
            TestCase {
                first: DepthDiff {
                    ts: 10,
                    seq: 10,
                    bids: vec![],
                    asks: vec![],
                },
                second: DepthDiff {
                    ts: 11,
                    seq: 11,
                    bids: vec![],
                    asks: vec![],
                },
                expect_err: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut book = OrderBookMirror::new();
            book.apply_diff(&test.first).unwrap();
            let result = book.apply_diff(&test.second);
            assert_eq!(result.is_err(), test.expect_err, "TC{index} failed");
        }
    }

    #[test]
    fn test_get_snapshot_respects_depth_limit() {
        let mut book = OrderBookMirror::new();
        book.apply_diff(&DepthDiff {
            ts: 1,
            seq: 1,
            bids: vec![(price(100), qty(1)), (price(99), qty(1)), (price(98), qty(1))],
            asks: vec![(price(101), qty(1)), (price(102), qty(1))],
        })
        .unwrap();

        let snapshot = book.get_snapshot(Some(2));
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.bids[0], (price(100), qty(1)));
        assert_eq!(snapshot.asks.len(), 2);
    }
}
