//! A cache that tracks the first read and the last write for each key
//! accessed during a transaction.
//!
//! The recorded first reads are what the storage backend re-validates at
//! commit time, so the cache is the source of truth for conflict detection.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

/// A key accessed within a transaction. Internally an [`Arc<Vec<u8>>`] for
/// cheap cloning between the cache and the commit log.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
pub struct CacheKey {
    /// The raw key bytes.
    pub key: Arc<Vec<u8>>,
}

/// A value read or written within a transaction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CacheValue {
    /// The raw value bytes.
    pub value: Arc<Vec<u8>>,
}

/// Error returned when a read is inconsistent with an earlier access of the
/// same key in the same transaction.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum ReadError {
    /// The same key was read twice with different results.
    #[error("inconsistent read, expected: {expected:?}, found: {found:?}")]
    InconsistentRead {
        /// The value recorded by the earlier access.
        expected: Option<CacheValue>,
        /// The value produced by the offending read.
        found: Option<CacheValue>,
    },
}

/// Cache entry can be in three states:
/// - Does not exist, a given key was never accessed in this transaction:
///     `ValueExists::No`
/// - Exists, but the key was absent from storage:
///     `ValueExists::Yes(None)`
/// - Exists and contains a value:
///     `ValueExists::Yes(Some(value))`
pub enum ValueExists {
    /// The key has been accessed; the payload is its latest known value.
    Yes(Option<CacheValue>),
    /// The key has not been accessed in this transaction.
    No,
}

/// `Access` represents the sequence of events on a particular key.
/// The rules for collapsing accesses are:
/// 1. A read preceded by another read must match it and is discarded.
/// 2. A read preceded by a write must match the written value and is discarded.
/// 3. A write following a read upgrades the entry to `ReadThenWrite`,
///    preserving the original read for commit-time validation.
/// 4. A write is retained unless it is followed by another write.
#[derive(PartialEq, Eq, Debug, Clone)]
pub(crate) enum Access {
    Read(Option<CacheValue>),
    ReadThenWrite {
        original: Option<CacheValue>,
        modified: Option<CacheValue>,
    },
    Write(Option<CacheValue>),
}

impl Access {
    pub(crate) fn last_value(&self) -> &Option<CacheValue> {
        match self {
            Access::Read(value) => value,
            Access::ReadThenWrite { modified, .. } => modified,
            Access::Write(value) => value,
        }
    }

    pub(crate) fn write_value(&mut self, new_value: Option<CacheValue>) {
        match self {
            Access::Read(original) => {
                *self = Access::ReadThenWrite {
                    original: original.take(),
                    modified: new_value,
                };
            }
            Access::ReadThenWrite { modified, .. } => *modified = new_value,
            Access::Write(value) => *value = new_value,
        }
    }
}

/// `CacheLog` keeps track of the first read and the last write for each key.
#[derive(Default)]
pub struct CacheLog {
    log: HashMap<CacheKey, Access>,
}

impl CacheLog {
    /// Returns the latest known value for the key, if the key was accessed.
    pub fn get_value(&self, key: &CacheKey) -> ValueExists {
        match self.log.get(key) {
            Some(value) => ValueExists::Yes(value.last_value().clone()),
            None => ValueExists::No,
        }
    }

    /// Records the first read for a given key. For an existing cache entry,
    /// checks that the read is consistent with previous reads/writes.
    pub fn add_read(&mut self, key: CacheKey, value: Option<CacheValue>) -> Result<(), ReadError> {
        match self.log.entry(key) {
            Entry::Occupied(existing) => {
                let last_value = existing.get().last_value().clone();

                if last_value != value {
                    return Err(ReadError::InconsistentRead {
                        expected: last_value,
                        found: value,
                    });
                }
                Ok(())
            }
            Entry::Vacant(vacancy) => {
                vacancy.insert(Access::Read(value));
                Ok(())
            }
        }
    }

    /// Adds a write entry to the cache.
    pub fn add_write(&mut self, key: CacheKey, value: Option<CacheValue>) {
        match self.log.entry(key) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().write_value(value);
            }
            Entry::Vacant(vacancy) => {
                vacancy.insert(Access::Write(value));
            }
        }
    }

    /// Consumes the log and returns every key that was written, with its
    /// final value. `None` values denote deletions.
    pub fn take_writes(self) -> Vec<(CacheKey, Option<CacheValue>)> {
        self.log
            .into_iter()
            .filter_map(|(k, access)| match access {
                Access::Read(_) => None,
                Access::ReadThenWrite { modified, .. } => Some((k, modified)),
                Access::Write(value) => Some((k, value)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_key(key: u8) -> CacheKey {
        CacheKey {
            key: Arc::new(vec![key]),
        }
    }

    fn create_value(value: u8) -> Option<CacheValue> {
        Some(CacheValue {
            value: Arc::new(vec![value]),
        })
    }

    impl ValueExists {
        fn get(self) -> Option<CacheValue> {
            match self {
                ValueExists::Yes(value) => value,
                ValueExists::No => unreachable!(),
            }
        }
    }

    #[test]
    fn test_cache_read_write() {
        let mut cache_log = CacheLog::default();
        let key = create_key(1);

        {
            let value = create_value(2);

            cache_log.add_read(key.clone(), value.clone()).unwrap();
            let value_from_cache = cache_log.get_value(&key).get();
            assert_eq!(value_from_cache, value);
        }

        {
            let value = create_value(3);

            cache_log.add_write(key.clone(), value.clone());

            let value_from_cache = cache_log.get_value(&key).get();
            assert_eq!(value_from_cache, value);

            cache_log.add_read(key.clone(), value.clone()).unwrap();

            let value_from_cache = cache_log.get_value(&key).get();
            assert_eq!(value_from_cache, value);
        }
    }

    #[test]
    fn test_inconsistent_read() {
        let mut cache_log = CacheLog::default();
        let key = create_key(1);

        cache_log.add_read(key.clone(), create_value(1)).unwrap();

        let res = cache_log.add_read(key, create_value(2));
        assert_eq!(
            res,
            Err(ReadError::InconsistentRead {
                expected: create_value(1),
                found: create_value(2)
            })
        );
    }

    #[test]
    fn test_read_then_write_preserves_original() {
        let original_value = create_value(1);
        let mut access = Access::Read(original_value.clone());

        {
            let new_value = create_value(2);
            access.write_value(new_value.clone());

            assert_eq!(access.last_value(), &new_value);
            assert_eq!(
                access,
                Access::ReadThenWrite {
                    original: original_value.clone(),
                    modified: new_value
                }
            );
        }

        {
            let new_value = create_value(3);
            access.write_value(new_value.clone());

            assert_eq!(access.last_value(), &new_value);
            assert_eq!(
                access,
                Access::ReadThenWrite {
                    original: original_value,
                    modified: new_value
                }
            );
        }
    }

    #[test]
    fn test_take_writes_skips_pure_reads() {
        let mut cache_log = CacheLog::default();

        cache_log.add_read(create_key(1), create_value(1)).unwrap();
        cache_log.add_write(create_key(2), create_value(2));
        cache_log.add_read(create_key(3), create_value(3)).unwrap();
        cache_log.add_write(create_key(3), create_value(4));

        let mut writes = cache_log.take_writes();
        writes.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));

        assert_eq!(
            writes,
            vec![
                (create_key(2), create_value(2)),
                (create_key(3), create_value(4)),
            ]
        );
    }
}
