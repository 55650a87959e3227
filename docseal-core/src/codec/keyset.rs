//! Persisted form of the wrapped keyset.

use async_trait::async_trait;

use super::DocumentCodec;
use crate::error::{DocsealError, DocsealResult};
use crate::keyset::EncryptedKeysetBinary;

/// Stores an [`EncryptedKeysetBinary`] as lowercase hex text.
///
/// An empty (or whitespace-only) file decodes to
/// [`EncryptedKeysetBinary::EMPTY`], so a keyset document that was never
/// written reads as "no keyset persisted".
#[derive(Debug, Clone, Copy, Default)]
pub struct KeysetCodec;

#[async_trait]
impl DocumentCodec for KeysetCodec {
    type Value = EncryptedKeysetBinary;

    fn default_value(&self) -> EncryptedKeysetBinary {
        EncryptedKeysetBinary::EMPTY
    }

    async fn decode(&self, bytes: &[u8]) -> DocsealResult<EncryptedKeysetBinary> {
        let text = bytes.trim_ascii();
        if text.is_empty() {
            return Ok(EncryptedKeysetBinary::EMPTY);
        }
        hex::decode(text)
            .map(EncryptedKeysetBinary::new)
            .map_err(|err| DocsealError::corruption("Keyset document is not valid hex", err))
    }

    async fn encode(&self, value: &EncryptedKeysetBinary) -> DocsealResult<Vec<u8>> {
        Ok(hex::encode(value.as_bytes()).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hex_encoding() {
        let keyset = EncryptedKeysetBinary::new(vec![0x00, 0xAB, 0xFF]);
        let encoded = KeysetCodec.encode(&keyset).await.expect("encode");
        assert_eq!(encoded, b"00abff");
        assert_eq!(KeysetCodec.decode(&encoded).await.expect("decode"), keyset);
    }

    #[tokio::test]
    async fn test_empty_document_is_empty_sentinel() {
        assert_eq!(KeysetCodec.default_value(), EncryptedKeysetBinary::EMPTY);
        assert_eq!(
            KeysetCodec.decode(b"").await.expect("decode"),
            EncryptedKeysetBinary::EMPTY
        );
        assert_eq!(
            KeysetCodec.decode(b" \n").await.expect("decode"),
            EncryptedKeysetBinary::EMPTY
        );
        assert!(KeysetCodec
            .encode(&EncryptedKeysetBinary::EMPTY)
            .await
            .expect("encode")
            .is_empty());
    }

    #[tokio::test]
    async fn test_invalid_hex_is_corruption() {
        match KeysetCodec.decode(b"zz").await {
            Err(err) => assert!(err.is_corruption(), "unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }
}
