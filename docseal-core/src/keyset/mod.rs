//! Keyset lifecycle: persisted keyset bytes, status resolution and the
//! provider that creates or opens keysets.

mod handle;
mod provider;

use subtle::ConstantTimeEq;

pub use handle::{KeysetAead, KeysetHandle, KEYSET_VERSION};
pub use provider::KeysetProvider;

/// The wrapped, serialized keyset as persisted on disk.
///
/// The zero-length value [`EncryptedKeysetBinary::EMPTY`] means "no keyset
/// persisted" and is never valid ciphertext. Contents are never printed.
#[derive(Clone, Default)]
pub struct EncryptedKeysetBinary(Vec<u8>);

impl EncryptedKeysetBinary {
    /// Sentinel for "no keyset persisted".
    pub const EMPTY: Self = Self(Vec::new());

    /// Wraps raw keyset bytes.
    #[must_use]
    pub const fn new(raw_keyset: Vec<u8>) -> Self {
        Self(raw_keyset)
    }

    /// Returns the wrapped keyset bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` for the empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of wrapped bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq for EncryptedKeysetBinary {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl Eq for EncryptedKeysetBinary {}

impl std::fmt::Debug for EncryptedKeysetBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedKeysetBinary")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Combined state of the persisted keyset and its master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeysetStatus {
    /// A keyset is persisted and its master key exists.
    Stored(EncryptedKeysetBinary),
    /// Neither a keyset nor a master key exists.
    NotStored,
    /// A keyset is persisted but its master key is gone. Unrecoverable.
    StoredButMasterKeyMissing,
    /// No keyset is persisted but the master key exists, typically because
    /// the alias already wraps the keyset of another document.
    NotStoredButMasterKeyStored,
}

impl KeysetStatus {
    /// Resolves the status from the persisted keyset and master key presence.
    #[must_use]
    pub fn resolve(persisted_keyset: EncryptedKeysetBinary, master_key_present: bool) -> Self {
        match (persisted_keyset.is_empty(), master_key_present) {
            (false, true) => Self::Stored(persisted_keyset),
            (true, true) => Self::NotStoredButMasterKeyStored,
            (false, false) => Self::StoredButMasterKeyMissing,
            (true, false) => Self::NotStored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn stored_keyset() -> EncryptedKeysetBinary {
        EncryptedKeysetBinary::new(vec![1, 2, 3])
    }

    #[test_case(stored_keyset(), true => KeysetStatus::Stored(stored_keyset()); "stored")]
    #[test_case(EncryptedKeysetBinary::EMPTY, false => KeysetStatus::NotStored; "not stored")]
    #[test_case(stored_keyset(), false => KeysetStatus::StoredButMasterKeyMissing; "master key missing")]
    #[test_case(EncryptedKeysetBinary::EMPTY, true => KeysetStatus::NotStoredButMasterKeyStored; "only master key")]
    fn test_resolve_status(keyset: EncryptedKeysetBinary, master_key_present: bool) -> KeysetStatus {
        KeysetStatus::resolve(keyset, master_key_present)
    }

    #[test]
    fn test_default_is_empty_sentinel() {
        assert_eq!(EncryptedKeysetBinary::default(), EncryptedKeysetBinary::EMPTY);
        assert!(EncryptedKeysetBinary::EMPTY.is_empty());
    }

    #[test]
    fn test_equality_is_by_content() {
        assert_eq!(stored_keyset(), EncryptedKeysetBinary::new(vec![1, 2, 3]));
        assert_ne!(stored_keyset(), EncryptedKeysetBinary::new(vec![1, 2]));
        assert_ne!(stored_keyset(), EncryptedKeysetBinary::new(vec![1, 2, 4]));
    }

    #[test]
    fn test_debug_hides_contents() {
        let keyset = EncryptedKeysetBinary::new(vec![0xAB; 4]);
        let printed = format!("{keyset:?}");
        assert!(!printed.contains("171"));
        assert!(!printed.to_lowercase().contains("ab, "));
        assert!(printed.contains("len: 4"));
    }
}
