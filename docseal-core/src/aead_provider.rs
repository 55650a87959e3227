//! Lazily provisioned, cached document AEAD.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::crypto::Aead;
use crate::error::{DocsealError, DocsealResult};
use crate::keyset::KeysetProvider;
use crate::platform::{KeysetPersistence, SharedKeyStore};

/// Hands out the AEAD primitive of one document's keyset.
///
/// The first successful [`get_aead`](Self::get_aead) resolves the keyset and
/// caches its primitive; every later call returns the same `Arc`. A failed
/// or cancelled call leaves the cache empty so the next call retries.
pub struct AeadProvider {
    keyset_provider: KeysetProvider,
    aead: OnceCell<Arc<dyn Aead>>,
}

impl AeadProvider {
    /// Creates a provider on top of `keyset_provider`.
    #[must_use]
    pub fn new(keyset_provider: KeysetProvider) -> Self {
        Self {
            keyset_provider,
            aead: OnceCell::new(),
        }
    }

    /// Creates a provider for the keyset persisted in `persistence`, wrapped
    /// by the master key `master_key_alias`.
    #[must_use]
    pub fn for_keyset(
        persistence: Arc<KeysetPersistence>,
        key_store: SharedKeyStore,
        master_key_alias: impl Into<String>,
        keyset_associated_data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(KeysetProvider::new(
            persistence,
            key_store,
            master_key_alias,
            keyset_associated_data,
        ))
    }

    /// The underlying keyset provider.
    #[must_use]
    pub const fn keyset_provider(&self) -> &KeysetProvider {
        &self.keyset_provider
    }

    /// Returns the document AEAD, provisioning the keyset on first use.
    ///
    /// Concurrent first calls wait on a single initialization.
    ///
    /// # Errors
    ///
    /// Propagates every [`KeysetProvider::get_keyset`] error; nothing is
    /// cached in that case.
    pub async fn get_aead(&self) -> DocsealResult<Arc<dyn Aead>> {
        if let Some(aead) = self.aead.get() {
            return Ok(Arc::clone(aead));
        }

        let aead = self
            .aead
            .get_or_try_init(|| async {
                let keyset = self.keyset_provider.get_keyset().await?;
                debug!(
                    alias = self.keyset_provider.master_key_alias(),
                    primary_key_id = keyset.primary_key_id(),
                    "document aead ready"
                );
                Ok::<_, DocsealError>(Arc::new(keyset.primitive()) as Arc<dyn Aead>)
            })
            .await?;
        Ok(Arc::clone(aead))
    }

    /// Returns `true` once a primitive is cached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.aead.initialized()
    }
}

impl std::fmt::Debug for AeadProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadProvider")
            .field("keyset_provider", &self.keyset_provider)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
