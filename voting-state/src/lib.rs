//! Storage and state management interfaces for the voting ledger.
//!
//! Every logical operation runs against a [`WorkingSet`]: reads are served
//! from a first-read-last-write cache on top of a [`Storage`] backend, writes
//! are buffered, and the whole read/write set is validated and applied in a
//! single atomic commit. A competing writer that committed in between causes
//! the commit to abort with a retriable conflict.

#![deny(missing_docs)]

pub mod cache;
pub mod codec;
mod map;
mod mem;
mod scratchpad;

/// Trait and type definitions related to the [`Storage`] trait.
pub mod storage;

use std::fmt::Display;
use std::str;

pub use map::StateMap;
pub use mem::MemStorage;
pub use scratchpad::{Delta, Event, OrderedReadsAndWrites, StateCheckpoint, WorkingSet};
pub use storage::{CommitError, Storage};

/// A prefix prepended to each key before insertion and retrieval from the
/// storage.
///
/// State containers share one [`WorkingSet`] per transaction, so each
/// container isolates its key space with a distinct prefix.
#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct Prefix {
    prefix: Vec<u8>,
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match str::from_utf8(&self.prefix) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "0x{}", hex::encode(&self.prefix)),
        }
    }
}

impl Prefix {
    /// Creates a new prefix from a byte vector.
    pub fn new(prefix: Vec<u8>) -> Self {
        Self { prefix }
    }

    /// Returns the raw bytes of the prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the length in bytes of the prefix.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// Returns `true` if the prefix is empty, `false` otherwise.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }
}

impl From<&str> for Prefix {
    fn from(prefix: &str) -> Self {
        Self::new(prefix.as_bytes().to_vec())
    }
}
