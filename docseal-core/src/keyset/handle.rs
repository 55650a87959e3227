//! In-memory keyset and the document primitive derived from it.
//!
//! # Serialized Format
//!
//! A keyset is CBOR-encoded as:
//!
//! ```text
//! version: u32
//! primary_key_id: u32
//! keys: [{ key_id: u32, enabled: bool, key_value: [u8; 32] }]
//! ```
//!
//! and persisted only after being sealed by the master key's wrapping
//! [`Aead`] with the keyset associated data.
//!
//! # Ciphertext Format
//!
//! Ciphertexts produced by [`KeysetAead`] carry the id of the key that
//! produced them:
//!
//! ```text
//! 0x01 || key_id (u32, big-endian) || nonce (24 bytes) || ciphertext || tag
//! ```

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::EncryptedKeysetBinary;
use crate::crypto::{Aead, SealingKey, KEY_SIZE};
use crate::error::{CryptoError, DocsealError, DocsealResult};

/// Current serialized keyset format version.
pub const KEYSET_VERSION: u32 = 1;

const OUTPUT_PREFIX_VERSION: u8 = 0x01;
const OUTPUT_PREFIX_SIZE: usize = 5;

#[derive(Serialize, Deserialize)]
struct SerializedKeyset {
    version: u32,
    primary_key_id: u32,
    keys: Vec<SerializedKey>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SerializedKey {
    key_id: u32,
    enabled: bool,
    key_value: Vec<u8>,
}

#[derive(Clone)]
struct KeyEntry {
    key_id: u32,
    enabled: bool,
    key: SealingKey,
}

/// Data-encryption keys for one document.
///
/// Holds a primary key used for new ciphertexts plus any older keys that
/// remain valid for decryption.
#[derive(Clone)]
pub struct KeysetHandle {
    primary_key_id: u32,
    keys: Vec<KeyEntry>,
}

impl KeysetHandle {
    /// Generates a keyset with a single fresh XChaCha20-Poly1305 key.
    #[must_use]
    pub fn generate_new() -> Self {
        let key_id = OsRng.next_u32();
        Self {
            primary_key_id: key_id,
            keys: vec![KeyEntry {
                key_id,
                enabled: true,
                key: SealingKey::generate(),
            }],
        }
    }

    /// Id of the key used for new ciphertexts.
    #[must_use]
    pub const fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    /// Ids of all keys in the keyset, in insertion order.
    #[must_use]
    pub fn key_ids(&self) -> Vec<u32> {
        self.keys.iter().map(|entry| entry.key_id).collect()
    }

    /// Adds a fresh key and makes it primary. Older keys keep decrypting.
    ///
    /// Returns the new primary key id.
    pub fn rotate(&mut self) -> u32 {
        let mut key_id = OsRng.next_u32();
        while self.keys.iter().any(|entry| entry.key_id == key_id) {
            key_id = OsRng.next_u32();
        }
        self.keys.push(KeyEntry {
            key_id,
            enabled: true,
            key: SealingKey::generate(),
        });
        self.primary_key_id = key_id;
        key_id
    }

    /// Serializes the keyset and seals it with `wrapper`, binding
    /// `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or sealing fails.
    pub fn encrypt_with(
        &self,
        wrapper: &dyn Aead,
        associated_data: &[u8],
    ) -> DocsealResult<EncryptedKeysetBinary> {
        let serialized = SerializedKeyset {
            version: KEYSET_VERSION,
            primary_key_id: self.primary_key_id,
            keys: self
                .keys
                .iter()
                .map(|entry| SerializedKey {
                    key_id: entry.key_id,
                    enabled: entry.enabled,
                    key_value: entry.key.as_bytes().to_vec(),
                })
                .collect(),
        };
        let mut bytes = Zeroizing::new(Vec::new());
        ciborium::ser::into_writer(&serialized, &mut *bytes)
            .map_err(|err| DocsealError::Serialization(err.to_string()))?;
        let sealed = wrapper.encrypt(&bytes, associated_data)?;
        Ok(EncryptedKeysetBinary::new(sealed))
    }

    /// Opens a keyset sealed by [`encrypt_with`](Self::encrypt_with).
    ///
    /// # Errors
    ///
    /// Returns [`DocsealError::Crypto`] if `wrapper` cannot open the bytes
    /// (wrong master key, wrong associated data or tampering), and
    /// [`DocsealError::Serialization`] or
    /// [`DocsealError::UnsupportedKeysetVersion`] if the opened bytes are not
    /// a valid keyset.
    pub fn decrypt_with(
        encrypted: &EncryptedKeysetBinary,
        wrapper: &dyn Aead,
        associated_data: &[u8],
    ) -> DocsealResult<Self> {
        let bytes = Zeroizing::new(wrapper.decrypt(encrypted.as_bytes(), associated_data)?);
        let serialized: SerializedKeyset = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|err| DocsealError::Serialization(err.to_string()))?;
        if serialized.version != KEYSET_VERSION {
            return Err(DocsealError::UnsupportedKeysetVersion(serialized.version));
        }

        let mut keys = Vec::with_capacity(serialized.keys.len());
        for key in &serialized.keys {
            let material: [u8; KEY_SIZE] = key.key_value.as_slice().try_into().map_err(|_| {
                DocsealError::Serialization(format!(
                    "key {} length mismatch: expected {KEY_SIZE}, got {}",
                    key.key_id,
                    key.key_value.len()
                ))
            })?;
            keys.push(KeyEntry {
                key_id: key.key_id,
                enabled: key.enabled,
                key: SealingKey::from_bytes(material),
            });
        }

        let primary_enabled = keys
            .iter()
            .any(|entry| entry.key_id == serialized.primary_key_id && entry.enabled);
        if !primary_enabled {
            return Err(DocsealError::Serialization(format!(
                "primary key {} missing or disabled",
                serialized.primary_key_id
            )));
        }

        Ok(Self {
            primary_key_id: serialized.primary_key_id,
            keys,
        })
    }

    /// Derives the document AEAD primitive for this keyset.
    #[must_use]
    pub fn primitive(&self) -> KeysetAead {
        let enabled = self
            .keys
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| (entry.key_id, entry.key.clone()))
            .collect();
        KeysetAead {
            primary_key_id: self.primary_key_id,
            keys: enabled,
        }
    }
}

impl std::fmt::Debug for KeysetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetHandle")
            .field("primary_key_id", &self.primary_key_id)
            .field("key_ids", &self.key_ids())
            .finish_non_exhaustive()
    }
}

/// Document AEAD backed by the enabled keys of a [`KeysetHandle`].
///
/// Encrypts with the primary key; decrypts with whichever key the
/// ciphertext prefix names.
pub struct KeysetAead {
    primary_key_id: u32,
    keys: Vec<(u32, SealingKey)>,
}

impl KeysetAead {
    fn key(&self, key_id: u32) -> Option<&SealingKey> {
        self.keys
            .iter()
            .find(|(id, _)| *id == key_id)
            .map(|(_, key)| key)
    }
}

impl std::fmt::Debug for KeysetAead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetAead")
            .field("primary_key_id", &self.primary_key_id)
            .finish_non_exhaustive()
    }
}

impl Aead for KeysetAead {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let primary = self
            .key(self.primary_key_id)
            .ok_or_else(|| CryptoError::Backend("primary key unavailable".to_string()))?;
        let body = primary.encrypt(plaintext, associated_data)?;
        let mut out = Vec::with_capacity(OUTPUT_PREFIX_SIZE + body.len());
        out.push(OUTPUT_PREFIX_VERSION);
        out.extend_from_slice(&self.primary_key_id.to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < OUTPUT_PREFIX_SIZE {
            return Err(CryptoError::Malformed("missing key prefix".to_string()));
        }
        let (prefix, body) = ciphertext.split_at(OUTPUT_PREFIX_SIZE);
        if prefix[0] != OUTPUT_PREFIX_VERSION {
            return Err(CryptoError::Malformed(format!(
                "unknown prefix version {:#04x}",
                prefix[0]
            )));
        }
        let key_id = u32::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]);
        let key = self.key(key_id).ok_or(CryptoError::Authentication)?;
        key.decrypt(body, associated_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyset_wrap_roundtrip() {
        let master = SealingKey::generate();
        let keyset = KeysetHandle::generate_new();
        let encrypted = keyset.encrypt_with(&master, b"profile").expect("wrap");
        assert!(!encrypted.is_empty());

        let reopened =
            KeysetHandle::decrypt_with(&encrypted, &master, b"profile").expect("unwrap");
        assert_eq!(reopened.primary_key_id(), keyset.primary_key_id());

        let ciphertext = keyset.primitive().encrypt(b"hello", b"").expect("encrypt");
        let plaintext = reopened.primitive().decrypt(&ciphertext, b"").expect("decrypt");
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn test_unwrap_with_other_associated_data_fails() {
        let master = SealingKey::generate();
        let encrypted = KeysetHandle::generate_new()
            .encrypt_with(&master, b"settings")
            .expect("wrap");

        match KeysetHandle::decrypt_with(&encrypted, &master, b"profile") {
            Err(DocsealError::Crypto(CryptoError::Authentication)) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_unwrap_with_other_master_key_fails() {
        let encrypted = KeysetHandle::generate_new()
            .encrypt_with(&SealingKey::generate(), b"profile")
            .expect("wrap");

        match KeysetHandle::decrypt_with(&encrypted, &SealingKey::generate(), b"profile") {
            Err(DocsealError::Crypto(CryptoError::Authentication)) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let master = SealingKey::generate();
        let serialized = SerializedKeyset {
            version: KEYSET_VERSION + 1,
            primary_key_id: 7,
            keys: vec![SerializedKey {
                key_id: 7,
                enabled: true,
                key_value: vec![0u8; KEY_SIZE],
            }],
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&serialized, &mut bytes).expect("serialize");
        let encrypted = EncryptedKeysetBinary::new(master.encrypt(&bytes, b"").expect("seal"));

        match KeysetHandle::decrypt_with(&encrypted, &master, b"") {
            Err(DocsealError::UnsupportedKeysetVersion(version)) => {
                assert_eq!(version, KEYSET_VERSION + 1);
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_rotation_keeps_old_ciphertexts_readable() {
        let mut keyset = KeysetHandle::generate_new();
        let first_primary = keyset.primary_key_id();
        let old_ciphertext = keyset.primitive().encrypt(b"before", b"").expect("encrypt");

        let new_primary = keyset.rotate();
        assert_ne!(new_primary, first_primary);
        assert_eq!(keyset.key_ids(), vec![first_primary, new_primary]);

        let primitive = keyset.primitive();
        let new_ciphertext = primitive.encrypt(b"after", b"").expect("encrypt");
        assert_eq!(&new_ciphertext[1..5], &new_primary.to_be_bytes());
        assert_eq!(primitive.decrypt(&old_ciphertext, b"").expect("old"), b"before");
        assert_eq!(primitive.decrypt(&new_ciphertext, b"").expect("new"), b"after");
    }

    #[test]
    fn test_ciphertext_from_other_keyset_fails() {
        let ciphertext = KeysetHandle::generate_new()
            .primitive()
            .encrypt(b"secret", b"")
            .expect("encrypt");
        let result = KeysetHandle::generate_new().primitive().decrypt(&ciphertext, b"");
        assert_eq!(result, Err(CryptoError::Authentication));
    }

    #[test]
    fn test_truncated_ciphertext_is_malformed() {
        let primitive = KeysetHandle::generate_new().primitive();
        assert!(matches!(
            primitive.decrypt(&[0x01, 0, 0], b""),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            primitive.decrypt(&[0x02, 0, 0, 0, 0, 1, 2], b""),
            Err(CryptoError::Malformed(_))
        ));
    }
}
