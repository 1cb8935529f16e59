//! Serialization and deserialization-related logic.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A trait for types that can serialize keys for storage access.
///
/// Keys are lookup-only: they are encoded on every access but never decoded
/// back, so no decoding half exists.
pub trait StateKeyCodec<K: ?Sized> {
    /// Serializes a key into a bytes vector.
    ///
    /// This method **must** not panic as all instances of the key type are
    /// supposed to be serializable.
    fn encode_key(&self, key: &K) -> Vec<u8>;
}

/// A trait for types that can serialize and deserialize values for storage
/// access.
pub trait StateValueCodec<V> {
    /// Error type that can arise during deserialization.
    type ValueError: std::fmt::Debug;

    /// Serializes a value into a bytes vector.
    ///
    /// This method **must** not panic as all instances of the value type are
    /// supposed to be serializable.
    fn encode_value(&self, value: &V) -> Vec<u8>;

    /// Tries to deserialize a value from a bytes slice, and returns a
    /// [`Result`] with either the deserialized value or an error.
    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError>;

    /// Deserializes a value from a bytes slice.
    ///
    /// # Panics
    /// Panics if the call to [`StateValueCodec::try_decode_value`] fails.
    fn decode_value(&self, bytes: &[u8]) -> V {
        self.try_decode_value(bytes)
            .map_err(|err| {
                format!(
                    "Failed to decode value 0x{}, error: {:?}",
                    hex::encode(bytes),
                    err
                )
            })
            .unwrap()
    }
}

/// A codec that persists values as JSON documents with explicit field names.
///
/// The byte representation of every record is an external contract: records
/// written by one version of this software are read back by later versions,
/// so values map field names to contents rather than relying on positional
/// encoding. Keys encode as their raw UTF-8 bytes.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct JsonCodec;

impl StateKeyCodec<String> for JsonCodec {
    fn encode_key(&self, key: &String) -> Vec<u8> {
        key.as_bytes().to_vec()
    }
}

impl StateKeyCodec<str> for JsonCodec {
    fn encode_key(&self, key: &str) -> Vec<u8> {
        key.as_bytes().to_vec()
    }
}

impl<V> StateValueCodec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    type ValueError = serde_json::Error;

    fn encode_value(&self, value: &V) -> Vec<u8> {
        serde_json::to_vec(value).expect("Failed to serialize value")
    }

    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_encode_as_raw_bytes() {
        let codec = JsonCodec;
        assert_eq!(codec.encode_key("voter-1"), b"voter-1".to_vec());
        assert_eq!(
            codec.encode_key(&"voter-1".to_string()),
            b"voter-1".to_vec()
        );
    }

    #[test]
    fn value_round_trip() {
        let codec = JsonCodec;
        let value = vec!["a".to_string(), "b".to_string()];

        let encoded = codec.encode_value(&value);
        let decoded: Vec<String> = codec.try_decode_value(&encoded).unwrap();
        assert_eq!(value, decoded);
    }
}
