//! Transaction workspaces over a [`Storage`] backend.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::cache::{self, CacheKey, CacheLog, CacheValue};
use crate::codec::{StateKeyCodec, StateValueCodec};
use crate::storage::{StorageKey, StorageValue};
use crate::{Prefix, Storage};

/// An event emitted during the execution of a transaction.
#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct Event {
    /// The event key.
    pub key: String,
    /// The event value.
    pub value: String,
}

impl Event {
    /// Creates a new event.
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A struct that contains the values read from the backend and the values to
/// be written, both in deterministic order. This is the unit handed to
/// [`Storage::validate_and_commit`].
#[derive(Debug, Default)]
pub struct OrderedReadsAndWrites {
    /// Each key read from the backend, in read order, with the value observed.
    pub ordered_reads: Vec<(CacheKey, Option<CacheValue>)>,
    /// Each key written, in key order. `None` values denote deletions.
    pub ordered_writes: Vec<(CacheKey, Option<CacheValue>)>,
}

/// Caches reads and writes for a (key, value) pair. On the first read the
/// value is fetched from the backend; on following reads the cache serves the
/// value it recorded before.
#[derive(Default)]
struct StorageInternalCache {
    tx_cache: CacheLog,
    ordered_db_reads: Vec<(CacheKey, Option<CacheValue>)>,
}

impl From<StorageInternalCache> for OrderedReadsAndWrites {
    fn from(val: StorageInternalCache) -> Self {
        let mut writes = val.tx_cache.take_writes();
        writes.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
        Self {
            ordered_reads: val.ordered_db_reads,
            ordered_writes: writes,
        }
    }
}

impl StorageInternalCache {
    /// Gets a value from the cache or reads it from the backing storage.
    fn get_or_fetch<S: Storage>(&mut self, key: &StorageKey, value_reader: &S) -> Option<StorageValue> {
        let cache_key = key.to_cache_key();
        let cache_value = self.tx_cache.get_value(&cache_key);

        match cache_value {
            cache::ValueExists::Yes(cache_value_exists) => cache_value_exists.map(Into::into),
            // If the value does not exist in the cache, then fetch it from the backend.
            cache::ValueExists::No => {
                let storage_value = value_reader.get(key);
                let cache_value = storage_value.as_ref().map(|v| v.clone().into_cache_value());

                self.add_read(cache_key, cache_value);
                storage_value
            }
        }
    }

    fn set(&mut self, key: &StorageKey, value: StorageValue) {
        let cache_key = key.to_cache_key();
        let cache_value = value.into_cache_value();
        self.tx_cache.add_write(cache_key, Some(cache_value));
    }

    fn delete(&mut self, key: &StorageKey) {
        let cache_key = key.to_cache_key();
        self.tx_cache.add_write(cache_key, None);
    }

    fn add_read(&mut self, key: CacheKey, value: Option<CacheValue>) {
        self.tx_cache
            .add_read(key.clone(), value.clone())
            // It is ok to panic here, we must guarantee that the cache is consistent.
            .unwrap_or_else(|e| panic!("Inconsistent read from the cache: {e:?}"));
        self.ordered_db_reads.push((key, value))
    }
}

/// A working set accumulates reads and writes on top of the underlying
/// backend, recording every first read for commit-time validation.
pub struct Delta<S: Storage> {
    inner: S,
    cache: StorageInternalCache,
}

impl<S: Storage> Delta<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Default::default(),
        }
    }

    fn get_revertable_wrapper(self) -> RevertableDelta<S> {
        RevertableDelta {
            inner: self,
            writes: Default::default(),
        }
    }

    fn get(&mut self, key: StorageKey) -> Option<StorageValue> {
        self.cache.get_or_fetch(&key, &self.inner)
    }

    fn set(&mut self, key: StorageKey, value: StorageValue) {
        self.cache.set(&key, value)
    }

    fn delete(&mut self, key: StorageKey) {
        self.cache.delete(&key)
    }

    fn freeze(&mut self) -> OrderedReadsAndWrites {
        let cache = std::mem::take(&mut self.cache);
        cache.into()
    }
}

impl<S: Storage> Debug for Delta<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delta").finish()
    }
}

/// A wrapper that adds additional writes on top of an underlying [`Delta`].
/// These are handy for implementing operations that might revert on top of an
/// existing working set, without running the risk that the whole working set
/// will be discarded if some particular operation reverts.
///
/// All reads are recorded in the underlying delta, because even reverted
/// transactions have to be validated to have executed against the correct
/// state.
struct RevertableDelta<S: Storage> {
    /// The inner (non-revertable) delta.
    inner: Delta<S>,
    /// A cache containing the most recent values written. Reads are first
    /// checked against this map, and if the key is not present, the
    /// underlying [`Delta`] is checked.
    writes: HashMap<CacheKey, Option<CacheValue>>,
}

impl<S: Storage> RevertableDelta<S> {
    fn get(&mut self, key: StorageKey) -> Option<StorageValue> {
        let key = key.to_cache_key();
        if let Some(value) = self.writes.get(&key) {
            return value.clone().map(Into::into);
        }
        self.inner.get(key.into())
    }

    fn set(&mut self, key: StorageKey, value: StorageValue) {
        self.writes
            .insert(key.to_cache_key(), Some(value.into_cache_value()));
    }

    fn delete(&mut self, key: StorageKey) {
        self.writes.insert(key.to_cache_key(), None);
    }

    fn commit(self) -> Delta<S> {
        let mut inner = self.inner;

        for (k, v) in self.writes.into_iter() {
            if let Some(v) = v {
                inner.set(k.into(), v.into());
            } else {
                inner.delete(k.into());
            }
        }

        inner
    }

    fn revert(self) -> Delta<S> {
        self.inner
    }
}

/// This structure is responsible for storing the read-write set and is
/// obtained from the [`WorkingSet`] by using either the `checkpoint` or
/// `revert` method.
pub struct StateCheckpoint<S: Storage> {
    delta: Delta<S>,
}

impl<S: Storage> StateCheckpoint<S> {
    /// Creates a new checkpoint over the given backend.
    pub fn new(inner: S) -> Self {
        Self {
            delta: Delta::new(inner),
        }
    }

    /// Wraps this checkpoint in a revertable [`WorkingSet`].
    pub fn to_revertable(self) -> WorkingSet<S> {
        WorkingSet {
            delta: self.delta.get_revertable_wrapper(),
            events: Default::default(),
        }
    }

    /// Extracts the ordered read/write set accumulated so far, leaving the
    /// checkpoint empty.
    pub fn freeze(&mut self) -> OrderedReadsAndWrites {
        self.delta.freeze()
    }
}

/// This structure contains the read-write set and the events collected during
/// the execution of a transaction. There are two ways to convert it into a
/// [`StateCheckpoint`]:
/// 1. By using the `checkpoint()` method, where all the changes are added to
///    the underlying checkpoint.
/// 2. By using the `revert()` method, where the most recent changes are
///    discarded.
pub struct WorkingSet<S: Storage> {
    delta: RevertableDelta<S>,
    events: Vec<Event>,
}

impl<S: Storage> WorkingSet<S> {
    /// Creates a new working set over the given backend.
    pub fn new(inner: S) -> Self {
        StateCheckpoint::new(inner).to_revertable()
    }

    /// Folds the pending changes into a [`StateCheckpoint`].
    pub fn checkpoint(self) -> StateCheckpoint<S> {
        StateCheckpoint {
            delta: self.delta.commit(),
        }
    }

    /// Discards the pending changes, keeping only the recorded reads.
    pub fn revert(self) -> StateCheckpoint<S> {
        StateCheckpoint {
            delta: self.delta.revert(),
        }
    }

    pub(crate) fn get(&mut self, key: StorageKey) -> Option<StorageValue> {
        self.delta.get(key)
    }

    pub(crate) fn set(&mut self, key: StorageKey, value: StorageValue) {
        self.delta.set(key, value)
    }

    pub(crate) fn delete(&mut self, key: StorageKey) {
        self.delta.delete(key)
    }

    /// Records an event.
    pub fn add_event(&mut self, key: &str, value: &str) {
        self.events.push(Event::new(key, value));
    }

    /// Takes all recorded events, leaving the event log empty.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Returns the events recorded so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl<S: Storage> WorkingSet<S> {
    pub(crate) fn set_value<Q, V, C>(
        &mut self,
        prefix: &Prefix,
        codec: &C,
        storage_key: &Q,
        value: &V,
    ) where
        Q: ?Sized,
        C: StateKeyCodec<Q> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, storage_key, codec);
        let storage_value = StorageValue::new(value, codec);
        self.set(storage_key, storage_value);
    }

    pub(crate) fn get_value<Q, V, C>(
        &mut self,
        prefix: &Prefix,
        codec: &C,
        storage_key: &Q,
    ) -> Option<V>
    where
        Q: ?Sized,
        C: StateKeyCodec<Q> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, storage_key, codec);
        self.get_decoded(codec, storage_key)
    }

    pub(crate) fn delete_value<Q, C>(&mut self, prefix: &Prefix, codec: &C, storage_key: &Q)
    where
        Q: ?Sized,
        C: StateKeyCodec<Q>,
    {
        let storage_key = StorageKey::new(prefix, storage_key, codec);
        self.delete(storage_key);
    }

    fn get_decoded<V, C>(&mut self, codec: &C, storage_key: StorageKey) -> Option<V>
    where
        C: StateValueCodec<V>,
    {
        let storage_value = self.get(storage_key)?;

        // It is ok to panic here. Deserialization problem means that something is terribly wrong.
        Some(codec.decode_value(storage_value.value()))
    }
}
