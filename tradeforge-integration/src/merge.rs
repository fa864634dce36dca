//! Deterministic two-way timeline merge (spec.md §4.4).
//!
//! `barter-integration::stream::merge` races two streams and yields
//! whichever resolves first — fine for live feeds, wrong for replay, where
//! the same two inputs must always interleave identically. This merge
//! never races: it buffers exactly one pending item per source and picks
//! between them with a fixed, resumable tie-break cascade.

use crate::error::ReaderError;
use crate::source::{RecordSource, TimelineRecord};

/// Which side of the merge a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SourceTag {
    Left,
    Right,
}

/// A record tagged with the side it was pulled from.
#[derive(Debug, Clone)]
pub enum Merged<L, R> {
    Left(L),
    Right(R),
}

/// Merges `left` and `right` into one causally ordered sequence.
///
/// Tie-break cascade on equal `ts`: a one-shot `next_source_on_equal_ts`
/// hint, then the sticky `prefer_right_on_equal_ts` default. The spec also
/// names `seq`, then first-seen `entry` order, then pull order as further
/// levels for a general k-way merge; with exactly one buffered candidate
/// per source, a source decision between the two is always final (the
/// loser's next record is only compared once it is pulled, at which point
/// it is compared fresh against whatever is then buffered on the other
/// side), so those levels never have a remaining ambiguity to resolve
/// here. They matter only within a single source's own file order, which
/// the readers already guarantee via the monotonic-timestamp assertion and
/// strict file-order emission.
pub struct DeterministicMerge<L, R>
where
    L: RecordSource,
    R: RecordSource,
    L::Item: TimelineRecord,
    R::Item: TimelineRecord,
{
    left: L,
    right: R,
    left_buf: Option<L::Item>,
    right_buf: Option<R::Item>,
    next_source_on_equal_ts: Option<SourceTag>,
    prefer_right_on_equal_ts: bool,
}

impl<L, R> DeterministicMerge<L, R>
where
    L: RecordSource,
    R: RecordSource,
    L::Item: TimelineRecord,
    R::Item: TimelineRecord,
{
    pub fn new(left: L, right: R, prefer_right_on_equal_ts: bool) -> Self {
        Self {
            left,
            right,
            left_buf: None,
            right_buf: None,
            next_source_on_equal_ts: None,
            prefer_right_on_equal_ts,
        }
    }

    /// Sets the one-shot tie-break hint, e.g. when resuming from a
    /// checkpoint that recorded it.
    pub fn set_next_source_on_equal_ts(&mut self, hint: Option<SourceTag>) {
        self.next_source_on_equal_ts = hint;
    }

    /// The current value of the one-shot hint, for checkpointing.
    pub fn next_source_on_equal_ts(&self) -> Option<SourceTag> {
        self.next_source_on_equal_ts
    }

    /// Exposes the left source so a caller (e.g. the replay driver building
    /// a checkpoint) can read its cursor without the merge needing to know
    /// what a cursor is.
    pub fn left(&self) -> &L {
        &self.left
    }

    /// See [`Self::left`].
    pub fn right(&self) -> &R {
        &self.right
    }

    async fn fill_left(&mut self) -> Result<(), ReaderError> {
        if self.left_buf.is_none() {
            self.left_buf = self.left.next().await?;
        }
        Ok(())
    }

    async fn fill_right(&mut self) -> Result<(), ReaderError> {
        if self.right_buf.is_none() {
            self.right_buf = self.right.next().await?;
        }
        Ok(())
    }

    /// Pulls the next merged record, or `None` once both sources are
    /// exhausted.
    pub async fn next(&mut self) -> Result<Option<Merged<L::Item, R::Item>>, ReaderError> {
        self.fill_left().await?;
        self.fill_right().await?;

        match (&self.left_buf, &self.right_buf) {
            (None, None) => Ok(None),
            (Some(_), None) => Ok(Some(Merged::Left(self.left_buf.take().unwrap()))),
            (None, Some(_)) => Ok(Some(Merged::Right(self.right_buf.take().unwrap()))),
            (Some(left), Some(right)) => {
                let winner = self.resolve_tie(left.ts(), right.ts());
                Ok(Some(match winner {
                    SourceTag::Left => Merged::Left(self.left_buf.take().unwrap()),
                    SourceTag::Right => Merged::Right(self.right_buf.take().unwrap()),
                }))
            }
        }
    }

    fn resolve_tie(&mut self, left_ts: i64, right_ts: i64) -> SourceTag {
        if left_ts != right_ts {
            return if left_ts < right_ts {
                SourceTag::Left
            } else {
                SourceTag::Right
            };
        }

        match self.next_source_on_equal_ts.take() {
            Some(hint) => hint,
            None if self.prefer_right_on_equal_ts => SourceTag::Right,
            None => SourceTag::Left,
        }
    }

    /// Releases both underlying sources.
    pub async fn close(&mut self) {
        self.left.close().await;
        self.right.close().await;
    }
}

pub async fn drain_remaining<L, R>(
    merge: &mut DeterministicMerge<L, R>,
) -> Result<Vec<Merged<L::Item, R::Item>>, ReaderError>
where
    L: RecordSource,
    R: RecordSource,
    L::Item: TimelineRecord,
    R::Item: TimelineRecord,
{
    let mut out = Vec::new();
    while let Some(next) = merge.next().await? {
        out.push(next);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    struct Rec {
        ts: i64,
        seq: u64,
    }

    impl TimelineRecord for Rec {
        fn ts(&self) -> i64 {
            self.ts
        }
        fn seq(&self) -> u64 {
            self.seq
        }
        fn entry(&self) -> Option<&str> {
            None
        }
    }

    struct VecSource(VecDeque<Rec>);

    #[async_trait]
    impl RecordSource for VecSource {
        type Item = Rec;

        async fn next(&mut self) -> Result<Option<Rec>, ReaderError> {
            Ok(self.0.pop_front())
        }

        async fn close(&mut self) {}
    }

    fn rec(ts: i64, seq: u64) -> Rec {
        Rec { ts, seq }
    }

    #[tokio::test]
    async fn test_merge_orders_by_ts_when_unambiguous() {
        let trades = VecSource(VecDeque::from(vec![rec(1, 0), rec(3, 1)]));
        let depth = VecSource(VecDeque::from(vec![rec(2, 0)]));
        let mut merge = DeterministicMerge::new(trades, depth, true);

        let out = drain_remaining(&mut merge).await.unwrap();
        let ts_order: Vec<i64> = out
            .iter()
            .map(|m| match m {
                Merged::Left(r) => r.ts,
                Merged::Right(r) => r.ts,
            })
            .collect();
        assert_eq!(ts_order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_equal_ts_prefers_depth_by_default() {
        let trades = VecSource(VecDeque::from(vec![rec(5, 2)]));
        let depth = VecSource(VecDeque::from(vec![rec(5, 9)]));
        let mut merge = DeterministicMerge::new(trades, depth, true);

        let first = merge.next().await.unwrap().unwrap();
        assert!(
            matches!(first, Merged::Right(_)),
            "depth should win ties by default"
        );
    }

    #[tokio::test]
    async fn test_one_shot_hint_then_default_resumes() {
        let trades = VecSource(VecDeque::from(vec![rec(5, 2), rec(7, 0)]));
        let depth = VecSource(VecDeque::from(vec![rec(5, 9), rec(7, 0)]));
        let mut merge = DeterministicMerge::new(trades, depth, true);
        merge.set_next_source_on_equal_ts(Some(SourceTag::Left));

        let first = merge.next().await.unwrap().unwrap();
        assert!(
            matches!(first, Merged::Left(_)),
            "hint should pick trades first"
        );
        assert!(
            merge.next_source_on_equal_ts().is_none(),
            "hint must be consumed after firing once"
        );

        let second = merge.next().await.unwrap().unwrap();
        assert!(
            matches!(second, Merged::Right(_)),
            "second equal-ts tie should fall back to default preference"
        );
    }

    #[tokio::test]
    async fn test_one_source_drains_after_other_exhausted() {
        let trades = VecSource(VecDeque::from(vec![rec(1, 0), rec(2, 0), rec(3, 0)]));
        let depth = VecSource(VecDeque::new());
        let mut merge = DeterministicMerge::new(trades, depth, true);

        let out = drain_remaining(&mut merge).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|m| matches!(m, Merged::Left(_))));
    }
}
