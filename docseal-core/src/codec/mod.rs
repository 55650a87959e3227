//! Byte codecs for persisted documents.
//!
//! A [`DocumentCodec`] turns one document value into the bytes written to
//! disk and back. Plaintext codecs live here; [`EncryptedDocumentCodec`]
//! wraps any of them with document-level encryption.

mod encrypted;
mod keyset;
mod preferences;

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{DocsealError, DocsealResult};

pub use encrypted::EncryptedDocumentCodec;
pub use keyset::KeysetCodec;
pub use preferences::{PreferenceValue, Preferences, PreferencesCodec};

/// Converts a document value to and from its persisted bytes.
///
/// `decode` failures on persisted bytes are reported as
/// [`DocsealError::Corruption`], which lets a store replace an unreadable
/// document instead of failing forever.
#[async_trait]
pub trait DocumentCodec: Send + Sync {
    /// The document value type.
    type Value: Send + Sync + 'static;

    /// Value of a document that has never been written.
    fn default_value(&self) -> Self::Value;

    /// Parses persisted bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DocsealError::Corruption`] if the bytes cannot be parsed.
    async fn decode(&self, bytes: &[u8]) -> DocsealResult<Self::Value>;

    /// Serializes `value` for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    async fn encode(&self, value: &Self::Value) -> DocsealResult<Vec<u8>>;
}

/// UTF-8 text document.
#[derive(Debug, Clone, Default)]
pub struct Utf8Codec {
    default_value: String,
}

impl Utf8Codec {
    /// Creates a codec whose default value is `default_value`.
    #[must_use]
    pub fn with_default(default_value: impl Into<String>) -> Self {
        Self {
            default_value: default_value.into(),
        }
    }
}

#[async_trait]
impl DocumentCodec for Utf8Codec {
    type Value = String;

    fn default_value(&self) -> String {
        self.default_value.clone()
    }

    async fn decode(&self, bytes: &[u8]) -> DocsealResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| DocsealError::corruption("Document is not valid UTF-8", err))
    }

    async fn encode(&self, value: &String) -> DocsealResult<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }
}

/// JSON document of any serde type. The default value is `T::default()`.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Creates a JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec").finish()
    }
}

#[async_trait]
impl<T> DocumentCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    type Value = T;

    fn default_value(&self) -> T {
        T::default()
    }

    async fn decode(&self, bytes: &[u8]) -> DocsealResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|err| DocsealError::corruption("Document is not valid JSON", err))
    }

    async fn encode(&self, value: &T) -> DocsealResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| DocsealError::Serialization(err.to_string()))
    }
}
