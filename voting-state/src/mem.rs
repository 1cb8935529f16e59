//! An in-process [`Storage`] implementation with optimistic concurrency.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;

use crate::cache::{CacheKey, CacheValue};
use crate::scratchpad::OrderedReadsAndWrites;
use crate::storage::{CommitError, StorageKey, StorageValue};
use crate::Storage;

/// A [`Storage`] backed by an in-memory map, shared between all clones of the
/// handle.
///
/// Commits are validated against the read set of the committing transaction:
/// if any key read by the transaction was modified since, the whole commit is
/// rejected and nothing is written. This is what turns two racing casts for
/// the same voter into one winner and one retriable conflict instead of a
/// lost update.
#[derive(Clone, Default)]
pub struct MemStorage {
    slots: Arc<RwLock<HashMap<CacheKey, CacheValue>>>,
}

impl MemStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn get(&self, key: &StorageKey) -> Option<StorageValue> {
        let slots = self.slots.read().expect("storage lock poisoned");
        slots.get(&key.to_cache_key()).cloned().map(Into::into)
    }

    fn validate_and_commit(&self, state_accesses: OrderedReadsAndWrites) -> Result<(), CommitError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| CommitError::Backend(anyhow!("storage lock poisoned")))?;

        // Every recorded first read must still be accurate. The check and the
        // writes below happen under one lock acquisition, so a competing
        // committer cannot interleave.
        for (key, read_value) in &state_accesses.ordered_reads {
            if slots.get(key) != read_value.as_ref() {
                return Err(CommitError::Conflict {
                    key: key.clone().into(),
                });
            }
        }

        for (key, write_value) in state_accesses.ordered_writes {
            match write_value {
                Some(value) => slots.insert(key, value),
                None => slots.remove(&key),
            };
        }

        Ok(())
    }

    fn is_empty(&self) -> bool {
        let slots = self.slots.read().expect("storage lock poisoned");
        slots.is_empty()
    }
}
