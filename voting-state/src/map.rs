//! A container that maps keys to values.

use core::marker::PhantomData;
use std::borrow::Borrow;

use thiserror::Error;

use crate::codec::{JsonCodec, StateKeyCodec, StateValueCodec};
use crate::storage::StorageKey;
use crate::{Prefix, Storage, WorkingSet};

/// A container that maps keys to values.
///
/// # Type parameters
/// [`StateMap`] is generic over:
/// - a key type (`K`);
/// - a value type (`V`);
/// - a codec (`C`).
#[derive(Debug, PartialEq, Clone)]
pub struct StateMap<K, V, C = JsonCodec> {
    _phantom: (PhantomData<K>, PhantomData<V>),
    codec: C,
    prefix: Prefix,
}

/// Error type for [`StateMap`] get method.
#[derive(Debug, Error)]
pub enum Error {
    /// No value is stored under the given key.
    #[error("Value not found for prefix: {0} and: storage key {1}")]
    MissingValue(Prefix, StorageKey),
}

impl<K, V> StateMap<K, V> {
    /// Creates a new [`StateMap`] with the given prefix and the default
    /// codec (i.e. [`JsonCodec`]).
    pub fn new(prefix: Prefix) -> Self {
        Self {
            _phantom: (PhantomData, PhantomData),
            codec: JsonCodec,
            prefix,
        }
    }
}

impl<K, V, C> StateMap<K, V, C> {
    /// Returns the prefix used when this [`StateMap`] was created.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Inserts a key-value pair into the map.
    pub fn set<S, Q>(&self, key: &Q, value: &V, working_set: &mut WorkingSet<S>)
    where
        S: Storage,
        Q: ?Sized,
        K: Borrow<Q>,
        C: StateKeyCodec<Q> + StateValueCodec<V>,
    {
        working_set.set_value(self.prefix(), &self.codec, key, value)
    }

    /// Returns the value corresponding to the key, or `None` if the key is
    /// absent in the map.
    ///
    /// The key may be passed as any type borrowed by `K`, e.g. a `&str` for a
    /// `StateMap<String, _>`.
    pub fn get<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> Option<V>
    where
        S: Storage,
        Q: ?Sized,
        K: Borrow<Q>,
        C: StateKeyCodec<Q> + StateValueCodec<V>,
    {
        working_set.get_value(self.prefix(), &self.codec, key)
    }

    /// Returns the value corresponding to the key, or an error if the key is
    /// absent in the map.
    ///
    /// For reference, check [`Self::get`].
    pub fn get_or_err<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> Result<V, Error>
    where
        S: Storage,
        Q: ?Sized,
        K: Borrow<Q>,
        C: StateKeyCodec<Q> + StateValueCodec<V>,
    {
        self.get(key, working_set).ok_or_else(|| {
            Error::MissingValue(
                self.prefix().clone(),
                StorageKey::new(self.prefix(), key, &self.codec),
            )
        })
    }

    /// Deletes a key from the map.
    pub fn delete<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>)
    where
        S: Storage,
        Q: ?Sized,
        K: Borrow<Q>,
        C: StateKeyCodec<Q>,
    {
        working_set.delete_value(self.prefix(), &self.codec, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemStorage;

    fn make_map() -> StateMap<String, u64> {
        StateMap::new(Prefix::from("test/counts/"))
    }

    #[test]
    fn set_and_get() {
        let storage = MemStorage::default();
        let mut working_set = WorkingSet::new(storage);
        let map = make_map();

        map.set("a", &7, &mut working_set);

        assert_eq!(map.get("a", &mut working_set), Some(7));
        assert_eq!(map.get("b", &mut working_set), None);
    }

    #[test]
    fn get_or_err_on_missing_key() {
        let storage = MemStorage::default();
        let mut working_set = WorkingSet::new(storage);
        let map = make_map();

        assert!(map.get_or_err("missing", &mut working_set).is_err());
    }

    #[test]
    fn prefixes_isolate_key_spaces() {
        let storage = MemStorage::default();
        let mut working_set = WorkingSet::new(storage);

        let left: StateMap<String, u64> = StateMap::new(Prefix::from("left/"));
        let right: StateMap<String, u64> = StateMap::new(Prefix::from("right/"));

        left.set("k", &1, &mut working_set);
        right.set("k", &2, &mut working_set);

        assert_eq!(left.get("k", &mut working_set), Some(1));
        assert_eq!(right.get("k", &mut working_set), Some(2));
    }
}
