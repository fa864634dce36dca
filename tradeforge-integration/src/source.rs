use crate::error::ReaderError;
use async_trait::async_trait;

/// A pull-based replacement for the generator-style asynchronous iterators
/// the original feed readers used. The matching loop (or the merge, on its
/// behalf) calls `next()` exactly when it is ready for another record;
/// nothing is pushed ahead of demand.
#[async_trait]
pub trait RecordSource: Send {
    type Item: Send;

    /// Pulls the next record, or `None` once the source is exhausted.
    async fn next(&mut self) -> Result<Option<Self::Item>, ReaderError>;

    /// Releases any held resources (file handles, archive readers). Safe to
    /// call more than once.
    async fn close(&mut self);
}

/// A timestamped, sequenced record participating in the deterministic
/// merge. `entry` is the archive-entry label a record came from (e.g. the
/// inner path of a zip), used for the fourth tie-break level.
pub trait TimelineRecord {
    fn ts(&self) -> i64;
    fn seq(&self) -> u64;
    fn entry(&self) -> Option<&str>;
}
