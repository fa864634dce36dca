//! Branded identifiers and the monotonic counters that mint them.
//!
//! Each id wraps a [`SmolStr`] rather than a bare integer so the wire/
//! checkpoint representation is a string, but the three kinds cannot be
//! confused with one another at compile time.

use derive_more::{AsRef, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cell::Cell;

/// A process-local monotonic counter. `ExchangeState` holds one per id kind
/// (`accountSeq`, `orderSeq`). The engine is single-logical-threaded
/// (spec.md §5), so a `Cell` is enough — no atomics needed — and its
/// current value round-trips through a checkpoint so ids minted after a
/// resume never collide with ones minted before it.
#[derive(Debug, Default)]
pub struct IdSequence {
    next: Cell<u64>,
}

impl IdSequence {
    pub fn new() -> Self {
        Self {
            next: Cell::new(1),
        }
    }

    /// Returns the next value and advances the counter. Never reuses a
    /// value within the life of this `IdSequence`.
    pub fn next(&self) -> u64 {
        let value = self.next.get();
        self.next.set(value + 1);
        value
    }

    /// The next value this sequence will hand out, for checkpointing.
    pub fn peek_next(&self) -> u64 {
        self.next.get()
    }

    /// Restores a sequence to resume exactly where it left off.
    pub fn from_next(next: u64) -> Self {
        Self {
            next: Cell::new(next),
        }
    }
}

impl Serialize for IdSequence {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.peek_next())
    }
}

impl<'de> Deserialize<'de> for IdSequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let next = u64::deserialize(deserializer)?;
        Ok(Self::from_next(next))
    }
}

macro_rules! branded_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRef, From)]
        #[as_ref(forward)]
        pub struct $name(SmolStr);

        impl $name {
            /// Mints a fresh id from a sequence counter value, e.g. `acc-7`.
            pub fn from_seq(seq: u64) -> Self {
                Self(SmolStr::new(format!(concat!($prefix, "-{}"), seq)))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(SmolStr::new(value))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.0.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = SmolStr::deserialize(deserializer)?;
                Ok(Self(s))
            }
        }
    };
}

branded_id!(AccountId, "acc");
branded_id!(OrderId, "ord");
branded_id!(SymbolId, "sym");
