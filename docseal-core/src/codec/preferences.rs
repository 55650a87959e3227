//! Typed key-value preferences document.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::DocumentCodec;
use crate::error::{DocsealError, DocsealResult};

const PREFERENCES_VERSION: u32 = 1;

/// A single preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PreferenceValue {
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Set of strings.
    StringSet(BTreeSet<String>),
    /// Raw bytes.
    Bytes(#[serde(with = "serde_bytes_compat")] Vec<u8>),
}

macro_rules! impl_from_preference {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PreferenceValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_preference! {
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Bool,
    String => String,
    BTreeSet<String> => StringSet,
    Vec<u8> => Bytes,
}

impl From<&str> for PreferenceValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Key-value preferences, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    entries: BTreeMap<String, PreferenceValue>,
}

impl Preferences {
    /// Creates an empty preferences map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PreferenceValue> {
        self.entries.get(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PreferenceValue>,
    ) -> Option<PreferenceValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<PreferenceValue> {
        self.entries.remove(key)
    }

    /// Returns `true` if `key` has a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored preferences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreferenceValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Removes every preference.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Serialize, Deserialize)]
struct SerializedPreferences {
    version: u32,
    entries: BTreeMap<String, PreferenceValue>,
}

/// CBOR codec for [`Preferences`]. The default value is the empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferencesCodec;

#[async_trait]
impl DocumentCodec for PreferencesCodec {
    type Value = Preferences;

    fn default_value(&self) -> Preferences {
        Preferences::new()
    }

    async fn decode(&self, bytes: &[u8]) -> DocsealResult<Preferences> {
        if bytes.is_empty() {
            return Ok(Preferences::new());
        }
        let serialized: SerializedPreferences = ciborium::de::from_reader(bytes)
            .map_err(|err| DocsealError::corruption("Preferences document is unreadable", err))?;
        if serialized.version != PREFERENCES_VERSION {
            return Err(DocsealError::corruption(
                "Preferences document is unreadable",
                DocsealError::Serialization(format!(
                    "unsupported preferences version: {}",
                    serialized.version
                )),
            ));
        }
        Ok(Preferences {
            entries: serialized.entries,
        })
    }

    async fn encode(&self, value: &Preferences) -> DocsealResult<Vec<u8>> {
        let serialized = SerializedPreferences {
            version: PREFERENCES_VERSION,
            entries: value.entries.clone(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&serialized, &mut bytes)
            .map_err(|err| DocsealError::Serialization(err.to_string()))?;
        Ok(bytes)
    }
}

/// Encodes byte vectors as CBOR byte strings instead of integer arrays.
mod serde_bytes_compat {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        ciborium::value::Value::deserialize(deserializer)?
            .into_bytes()
            .map_err(|_| serde::de::Error::custom("expected a byte string"))
    }
}
