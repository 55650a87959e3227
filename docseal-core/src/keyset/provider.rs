//! Keyset provider: opens the persisted keyset, or provisions one.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{EncryptedKeysetBinary, KeysetHandle, KeysetStatus};
use crate::error::{CryptoError, DocsealError, DocsealResult};
use crate::platform::{KeysetPersistence, SecureKeyStore, SharedKeyStore};

/// Provides the keyset used to encrypt one document.
///
/// The keyset is persisted wrapped by the master key stored under
/// `master_key_alias`, with `keyset_associated_data` bound into the wrap. If
/// several keysets share one alias, each must use distinct associated data.
pub struct KeysetProvider {
    persistence: Arc<KeysetPersistence>,
    key_store: SharedKeyStore,
    master_key_alias: String,
    keyset_associated_data: Vec<u8>,
}

impl KeysetProvider {
    /// Creates a provider for the keyset held by `persistence`.
    #[must_use]
    pub fn new(
        persistence: Arc<KeysetPersistence>,
        key_store: SharedKeyStore,
        master_key_alias: impl Into<String>,
        keyset_associated_data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            persistence,
            key_store,
            master_key_alias: master_key_alias.into(),
            keyset_associated_data: keyset_associated_data.into(),
        }
    }

    /// Alias of the master key wrapping this keyset.
    #[must_use]
    pub fn master_key_alias(&self) -> &str {
        &self.master_key_alias
    }

    /// Returns the persisted keyset, generating and persisting one (and the
    /// master key, if absent) when none exists.
    ///
    /// Status resolution, generation and persistence all run while holding
    /// the key store lock, so concurrent callers never both generate.
    ///
    /// # Errors
    ///
    /// - [`DocsealError::UnrecoverableKeyLoss`] if a keyset is persisted but
    ///   its master key is gone. No new keyset is generated in that case.
    /// - [`DocsealError::Corruption`] if the persisted keyset fails to
    ///   authenticate under the master key and associated data.
    /// - Key store and persistence errors as reported by the collaborators.
    pub async fn get_keyset(&self) -> DocsealResult<KeysetHandle> {
        let key_store = self.key_store.lock().await;
        self.get_or_create_keyset(&*key_store).await
    }

    /// Resolves the current [`KeysetStatus`] without modifying anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyset cannot be read or the key store cannot
    /// be queried.
    pub async fn status(&self) -> DocsealResult<KeysetStatus> {
        let key_store = self.key_store.lock().await;
        self.check_status(&*key_store).await
    }

    async fn check_status(&self, key_store: &dyn SecureKeyStore) -> DocsealResult<KeysetStatus> {
        let encrypted_keyset = self.persistence.reload().await?;
        let master_key_exists = key_store.has_key(&self.master_key_alias).await?;
        let status = KeysetStatus::resolve(encrypted_keyset, master_key_exists);
        debug!(alias = %self.master_key_alias, ?status, "resolved keyset status");
        Ok(status)
    }

    async fn get_or_create_keyset(
        &self,
        key_store: &dyn SecureKeyStore,
    ) -> DocsealResult<KeysetHandle> {
        match self.check_status(key_store).await? {
            KeysetStatus::Stored(encrypted_keyset) => {
                self.read_keyset(key_store, &encrypted_keyset).await
            }
            KeysetStatus::NotStored => {
                info!(alias = %self.master_key_alias, "generating master key");
                key_store.generate_key(&self.master_key_alias).await?;
                self.create_keyset(key_store).await
            }
            KeysetStatus::NotStoredButMasterKeyStored => {
                // The alias already wraps another document's keyset.
                self.create_keyset(key_store).await
            }
            KeysetStatus::StoredButMasterKeyMissing => {
                warn!(
                    alias = %self.master_key_alias,
                    "keyset is persisted but its master key is missing"
                );
                Err(DocsealError::UnrecoverableKeyLoss {
                    alias: self.master_key_alias.clone(),
                })
            }
        }
    }

    async fn create_keyset(&self, key_store: &dyn SecureKeyStore) -> DocsealResult<KeysetHandle> {
        let wrapper = key_store.wrapping_aead(&self.master_key_alias).await?;
        let encrypted_keyset = KeysetHandle::generate_new()
            .encrypt_with(wrapper.as_ref(), &self.keyset_associated_data)?;
        let persisted = self
            .persistence
            .update(Box::new(move |current| {
                // A keyset committed since the status was resolved wins.
                if current.is_empty() {
                    encrypted_keyset
                } else {
                    current
                }
            }))
            .await?;
        info!(
            alias = %self.master_key_alias,
            wrapped_len = persisted.len(),
            "persisted keyset"
        );
        self.read_keyset(key_store, &persisted).await
    }

    async fn read_keyset(
        &self,
        key_store: &dyn SecureKeyStore,
        encrypted_keyset: &EncryptedKeysetBinary,
    ) -> DocsealResult<KeysetHandle> {
        let wrapper = key_store.wrapping_aead(&self.master_key_alias).await?;
        match KeysetHandle::decrypt_with(
            encrypted_keyset,
            wrapper.as_ref(),
            &self.keyset_associated_data,
        ) {
            Ok(keyset) => Ok(keyset),
            Err(
                err @ (DocsealError::Crypto(
                    CryptoError::Authentication | CryptoError::Malformed(_),
                )
                | DocsealError::Serialization(_)),
            ) => Err(DocsealError::corruption(
                "Failed to decrypt the keyset. The encrypted keyset is corrupted, \
                 or it was encrypted with a different master key.",
                err,
            )),
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for KeysetProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetProvider")
            .field("master_key_alias", &self.master_key_alias)
            .finish_non_exhaustive()
    }
}
