//! Document-level encryption on top of a plaintext codec.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::DocumentCodec;
use crate::aead_provider::AeadProvider;
use crate::error::{CryptoError, DocsealError, DocsealResult};

const DECRYPT_FAILURE: &str = "Failed to decrypt data. The data is corrupted, \
     or it was encrypted with a different keyset.";

/// Encrypts the bytes of the wrapped codec `C` with the document AEAD.
///
/// Persisted bytes are the base64 (standard alphabet) encoding of the AEAD
/// ciphertext. No associated data is bound per document; the binding lives
/// in the keyset wrap. The default value is the wrapped codec's default.
pub struct EncryptedDocumentCodec<C> {
    inner: C,
    aead_provider: Arc<AeadProvider>,
}

impl<C> EncryptedDocumentCodec<C> {
    /// Wraps `inner`, encrypting with the AEAD of `aead_provider`.
    #[must_use]
    pub const fn new(inner: C, aead_provider: Arc<AeadProvider>) -> Self {
        Self {
            inner,
            aead_provider,
        }
    }

    /// The AEAD provider backing this codec.
    #[must_use]
    pub const fn aead_provider(&self) -> &Arc<AeadProvider> {
        &self.aead_provider
    }
}

#[async_trait]
impl<C: DocumentCodec> DocumentCodec for EncryptedDocumentCodec<C> {
    type Value = C::Value;

    fn default_value(&self) -> C::Value {
        self.inner.default_value()
    }

    async fn decode(&self, bytes: &[u8]) -> DocsealResult<C::Value> {
        let ciphertext = STANDARD
            .decode(bytes)
            .map_err(|err| DocsealError::corruption(DECRYPT_FAILURE, err))?;
        let aead = self.aead_provider.get_aead().await?;
        let plaintext = match aead.decrypt(&ciphertext, &[]) {
            Ok(plaintext) => plaintext,
            Err(err @ (CryptoError::Authentication | CryptoError::Malformed(_))) => {
                return Err(DocsealError::corruption(DECRYPT_FAILURE, err));
            }
            Err(err) => return Err(err.into()),
        };
        self.inner.decode(&plaintext).await
    }

    async fn encode(&self, value: &C::Value) -> DocsealResult<Vec<u8>> {
        let plaintext = self.inner.encode(value).await?;
        let aead = self.aead_provider.get_aead().await?;
        let ciphertext = aead.encrypt(&plaintext, &[])?;
        Ok(STANDARD.encode(ciphertext).into_bytes())
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for EncryptedDocumentCodec<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedDocumentCodec")
            .field("inner", &self.inner)
            .field("aead_provider", &self.aead_provider)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Utf8Codec;
    use crate::keyset::EncryptedKeysetBinary;
    use crate::platform::{
        KeysetPersistence, MemoryDocumentStore, MemoryKeyStore, SharedKeyStore,
    };

    fn codec(key_store: &SharedKeyStore, alias: &str, ad: &[u8]) -> EncryptedDocumentCodec<Utf8Codec> {
        let persistence: Arc<KeysetPersistence> =
            Arc::new(MemoryDocumentStore::<EncryptedKeysetBinary>::default());
        EncryptedDocumentCodec::new(
            Utf8Codec::with_default("nothing yet"),
            Arc::new(AeadProvider::for_keyset(
                persistence,
                key_store.clone(),
                alias,
                ad,
            )),
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));
        let codec = codec(&key_store, "master", b"notes");

        let encoded = codec.encode(&"top secret".to_string()).await.expect("encode");
        assert!(!String::from_utf8_lossy(&encoded).contains("top secret"));
        assert!(STANDARD.decode(&encoded).is_ok());
        assert_eq!(codec.decode(&encoded).await.expect("decode"), "top secret");
    }

    #[tokio::test]
    async fn test_default_is_plaintext_default() {
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));
        assert_eq!(codec(&key_store, "master", b"notes").default_value(), "nothing yet");
    }

    #[tokio::test]
    async fn test_ciphertext_from_other_keyset_is_corruption() {
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));
        let notes = codec(&key_store, "master", b"notes");
        let todos = codec(&key_store, "master", b"todos");

        let encoded = notes.encode(&"from notes".to_string()).await.expect("encode");
        match todos.decode(&encoded).await {
            Err(err) => assert!(err.is_corruption(), "unexpected error: {err}"),
            Ok(value) => panic!("decoded foreign ciphertext as {value:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_base64_is_corruption() {
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));
        match codec(&key_store, "master", b"notes").decode(b"not base64!").await {
            Err(err) => assert!(err.is_corruption(), "unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }
}
