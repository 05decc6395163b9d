use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;
use crate::serialize;

/// A 32-byte Blake3 hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn new(data: [u8; 32]) -> Self {
        Hash(data)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Hash(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(CoreError::InvalidHashLength)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hex in human-readable formats such as JSON, raw bytes otherwise. The
/// binary form is what ids are derived from and must not change.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Hash::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Hash)
        }
    }
}

/// Compute Blake3 hash of data
pub fn hash_blake3(data: &[u8]) -> Hash {
    let hash = blake3::hash(data);
    Hash(*hash.as_bytes())
}

/// Hash the bincode encoding of a value
pub fn hash_object<T: Serialize>(value: &T) -> Result<Hash, CoreError> {
    let bytes = serialize::to_bytes(value)?;
    Ok(hash_blake3(&bytes))
}

/// Declares a typed identifier wrapping a [`Hash`].
macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord, Default,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub $crate::hash::Hash);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                $name($crate::hash::Hash(bytes))
            }

            pub fn as_hash(&self) -> &$crate::hash::Hash {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }

            pub fn from_hex(s: &str) -> Result<Self, $crate::error::CoreError> {
                $crate::hash::Hash::from_hex(s).map($name)
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl From<$crate::hash::Hash> for $name {
            fn from(hash: $crate::hash::Hash) -> Self {
                $name(hash)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.to_hex())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.to_hex())
            }
        }
    };
}

pub(crate) use hash_id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        assert_eq!(hash_blake3(data), hash_blake3(data));
        assert_ne!(hash_blake3(data), Hash::ZERO);
    }

    #[test]
    fn test_hash_object_differs_by_content() {
        let a = hash_object(&(1u64, "a")).unwrap();
        let b = hash_object(&(1u64, "b")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = hash_blake3(b"test");
        let recovered = Hash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, recovered);
    }

    #[test]
    fn test_hash_json_is_hex() {
        let hash = hash_blake3(b"test");
        let json = serialize::to_json(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        assert_eq!(serialize::from_json::<Hash>(&json).unwrap(), hash);
        assert_eq!(serialize::to_bytes(&hash).unwrap(), hash.0.to_vec());
    }

    #[test]
    fn test_hash_from_short_hex() {
        let result = Hash::from_hex("abcd");
        assert!(matches!(result, Err(CoreError::InvalidHashLength)));
    }
}
