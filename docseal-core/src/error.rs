//! Error types for keyset provisioning and encrypted documents.

use thiserror::Error;

/// Result type for docseal operations.
pub type DocsealResult<T> = Result<T, DocsealError>;

/// Failures reported by an [`Aead`](crate::crypto::Aead) primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The authentication tag did not verify: tampered ciphertext, wrong key
    /// or mismatched associated data.
    #[error("authentication failed")]
    Authentication,

    /// The ciphertext does not have the expected layout.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// The primitive itself failed (key unavailable, cipher refused input).
    #[error("crypto backend error: {0}")]
    Backend(String),
}

/// Errors raised by docseal.
#[derive(Debug, Error)]
pub enum DocsealError {
    /// Stored ciphertext could not be authenticated or decoded.
    ///
    /// Callers may treat this as irrecoverable loss of the affected document.
    #[error("{context}")]
    Corruption {
        /// Description of what failed to decrypt or decode.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A keyset is persisted but the master key that wraps it is gone.
    #[error(
        "the master key `{alias}` is missing; if the device was restored from a backup, \
         the master key may have been lost"
    )]
    UnrecoverableKeyLoss {
        /// Alias of the missing master key.
        alias: String,
    },

    /// Errors coming from the secure key store.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// Encryption failures that do not indicate corrupted input.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An I/O operation on a persisted document failed.
    #[error("{context}: {source}")]
    Io {
        /// The operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization failures of plaintext values.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Keyset written by an unknown format version.
    #[error("unsupported keyset version: {0}")]
    UnsupportedKeysetVersion(u32),
}

impl DocsealError {
    pub(crate) fn corruption(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Corruption {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for [`DocsealError::Corruption`].
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }

    /// Returns `true` for [`DocsealError::UnrecoverableKeyLoss`].
    #[must_use]
    pub const fn is_unrecoverable_key_loss(&self) -> bool {
        matches!(self, Self::UnrecoverableKeyLoss { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_keeps_source() {
        let err = DocsealError::corruption("Failed to decrypt data", CryptoError::Authentication);
        assert!(err.is_corruption());
        assert!(!err.is_unrecoverable_key_loss());
        assert_eq!(err.to_string(), "Failed to decrypt data");
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "authentication failed");
    }

    #[test]
    fn test_key_loss_names_alias() {
        let err = DocsealError::UnrecoverableKeyLoss {
            alias: "profile_master_key".to_string(),
        };
        assert!(err.is_unrecoverable_key_loss());
        assert!(err.to_string().contains("profile_master_key"));
    }
}
