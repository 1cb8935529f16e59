//! The backend contract consumed by the state layer: a key-value store with
//! an atomic, conflict-checked multi-key commit.

use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheKey, CacheValue};
use crate::codec::{StateKeyCodec, StateValueCodec};
use crate::scratchpad::OrderedReadsAndWrites;
use crate::Prefix;

/// `Key` type for the [`Storage`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StorageKey {
    key: Arc<Vec<u8>>,
}

impl From<CacheKey> for StorageKey {
    fn from(cache_key: CacheKey) -> Self {
        Self { key: cache_key.key }
    }
}

impl StorageKey {
    /// Returns a clone of the underlying key bytes.
    pub fn key(&self) -> Arc<Vec<u8>> {
        self.key.clone()
    }

    /// Converts this key into a [`CacheKey`].
    pub fn to_cache_key(&self) -> CacheKey {
        CacheKey {
            key: self.key.clone(),
        }
    }
}

impl AsRef<Vec<u8>> for StorageKey {
    fn as_ref(&self) -> &Vec<u8> {
        &self.key
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.key().as_ref()))
    }
}

impl StorageKey {
    /// Creates a new `StorageKey` that combines a prefix and a key.
    pub fn new<Q, KC>(prefix: &Prefix, key: &Q, codec: &KC) -> Self
    where
        KC: StateKeyCodec<Q>,
        Q: ?Sized,
    {
        let encoded_key = codec.encode_key(key);

        let mut full_key = Vec::with_capacity(prefix.len() + encoded_key.len());
        full_key.extend_from_slice(prefix.as_bytes());
        full_key.extend_from_slice(&encoded_key);

        Self {
            key: Arc::new(full_key),
        }
    }
}

/// A serialized value suitable for storing. Internally uses an
/// [`Arc<Vec<u8>>`] for cheap cloning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageValue {
    value: Arc<Vec<u8>>,
}

impl From<CacheValue> for StorageValue {
    fn from(cache_value: CacheValue) -> Self {
        Self {
            value: cache_value.value,
        }
    }
}

impl From<Vec<u8>> for StorageValue {
    fn from(value: Vec<u8>) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

impl StorageValue {
    /// Create a new storage value by serializing the input with the given codec.
    pub fn new<V, VC>(value: &V, codec: &VC) -> Self
    where
        VC: StateValueCodec<V>,
    {
        let encoded_value = codec.encode_value(value);
        Self {
            value: Arc::new(encoded_value),
        }
    }

    /// Get the bytes of this value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Convert this value into a [`CacheValue`].
    pub fn into_cache_value(self) -> CacheValue {
        CacheValue { value: self.value }
    }
}

/// Error returned by [`Storage::validate_and_commit`].
#[derive(Debug, Error)]
pub enum CommitError {
    /// A key read by this transaction was modified by a competing committed
    /// writer. The transaction wrote nothing and may be retried from the
    /// beginning.
    #[error("commit conflict: key {key} changed since it was read")]
    Conflict {
        /// The first key whose stored value no longer matches the recorded read.
        key: StorageKey,
    },

    /// The backend failed. Not retriable without operator intervention.
    #[error("storage backend failure")]
    Backend(#[source] anyhow::Error),
}

impl CommitError {
    /// Returns `true` if retrying the whole transaction may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, CommitError::Conflict { .. })
    }
}

/// An interface for storing and retrieving values in the storage.
///
/// Implementations are handles onto a shared store: cloning must yield a
/// handle onto the same underlying data.
pub trait Storage: Clone {
    /// Returns the value corresponding to the key or `None` if key is absent.
    fn get(&self, key: &StorageKey) -> Option<StorageValue>;

    /// Validates all the reads recorded by a transaction against the current
    /// contents of the store and, only if every read is still accurate,
    /// applies all the writes. The check and the writes are atomic: a
    /// transaction either commits in full against the state it observed, or
    /// aborts with [`CommitError::Conflict`] leaving the store untouched.
    fn validate_and_commit(&self, state_accesses: OrderedReadsAndWrites) -> Result<(), CommitError>;

    /// Indicates if storage is empty or not.
    /// Useful during initialization.
    fn is_empty(&self) -> bool;
}

// Used only in tests.
#[cfg(test)]
impl From<&'static str> for StorageKey {
    fn from(key: &'static str) -> Self {
        Self {
            key: Arc::new(key.as_bytes().to_vec()),
        }
    }
}

// Used only in tests.
#[cfg(test)]
impl From<&'static str> for StorageValue {
    fn from(value: &'static str) -> Self {
        Self {
            value: Arc::new(value.as_bytes().to_vec()),
        }
    }
}
