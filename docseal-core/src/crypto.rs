//! AEAD primitives.
//!
//! [`Aead`] is the seam shared by master-key wrapping primitives handed out by
//! a [`SecureKeyStore`](crate::platform::SecureKeyStore) and by the document
//! primitive derived from a keyset. [`SealingKey`] is the XChaCha20-Poly1305
//! implementation used for both in this crate.

use chacha20poly1305::{
    aead::{Aead as _, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Size of the XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of a [`SealingKey`] in bytes.
pub const KEY_SIZE: usize = 32;

/// Authenticated encryption with associated data.
///
/// Implementations must fail decryption with [`CryptoError::Authentication`]
/// whenever the key, the ciphertext or the associated data differ from the
/// values used to encrypt.
pub trait Aead: Send + Sync {
    /// Encrypts `plaintext`, binding `associated_data` into the tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the primitive cannot encrypt.
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts `ciphertext`, verifying `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Authentication`] on tag mismatch and
    /// [`CryptoError::Malformed`] when the input cannot be parsed.
    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8])
        -> Result<Vec<u8>, CryptoError>;
}

/// A 256-bit XChaCha20-Poly1305 key.
///
/// Ciphertexts are laid out as `nonce || ciphertext || tag` with a fresh
/// random nonce per call. The key is zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey([u8; KEY_SIZE]);

impl SealingKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a new random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes. Treat as sensitive material.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Aead for SealingKey {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|err| CryptoError::Backend(err.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Malformed(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: payload,
                    aad: associated_data,
                },
            )
            .map_err(|_| CryptoError::Authentication)
    }
}
