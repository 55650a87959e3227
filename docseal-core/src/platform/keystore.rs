//! Secure key store trait for hardware-backed master keys.
//!
//! Master keys never leave the key store. The store hands out a wrapping
//! [`Aead`] per alias which the keyset provider uses to seal and open keysets.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::crypto::Aead;
use crate::error::DocsealResult;

/// Hardware-backed storage of master keys identified by alias.
///
/// Platform implementations should use non-exportable keys:
/// - Android: Android Keystore (AES-256-GCM, hardware-backed where available)
/// - iOS: Keychain Services with `kSecAttrAccessibleWhenUnlockedThisDeviceOnly`
///
/// Implementations are not required to be safe under concurrent use. All
/// access from this crate goes through a [`SharedKeyStore`], which serializes
/// callers.
///
/// # Associated Data
///
/// One alias may wrap several keysets as long as each keyset is sealed with
/// distinct associated data; the wrapping [`Aead`] must bind the associated
/// data into its tag.
#[async_trait]
pub trait SecureKeyStore: Send + Sync {
    /// Returns whether a master key exists under `alias`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store cannot be queried.
    async fn has_key(&self, alias: &str) -> DocsealResult<bool>;

    /// Generates a new master key under `alias`.
    ///
    /// Callers only invoke this when [`has_key`](Self::has_key) reported the
    /// alias absent; implementations need not be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be generated or stored.
    async fn generate_key(&self, alias: &str) -> DocsealResult<()>;

    /// Deletes the master key under `alias`. Deleting an absent key succeeds.
    ///
    /// Every keyset wrapped by this key becomes unrecoverable.
    ///
    /// # Errors
    ///
    /// Returns an error for key store failures.
    async fn delete_key(&self, alias: &str) -> DocsealResult<()>;

    /// Returns the primitive that wraps and unwraps keysets under `alias`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or unusable.
    async fn wrapping_aead(&self, alias: &str) -> DocsealResult<Arc<dyn Aead>>;
}

/// A key store paired with the mutex that serializes access to it.
///
/// Clones share the same store and the same mutex, so every keyset provider
/// built from clones of one handle observes a single, totally ordered history
/// of key store operations.
#[derive(Clone)]
pub struct SharedKeyStore {
    store: Arc<dyn SecureKeyStore>,
    lock: Arc<Mutex<()>>,
}

impl SharedKeyStore {
    /// Wraps `store` with a fresh mutex.
    #[must_use]
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Waits for exclusive access to the key store.
    ///
    /// The returned session releases the lock on drop, including when the
    /// awaiting future is cancelled.
    pub async fn lock(&self) -> KeyStoreSession<'_> {
        let guard = self.lock.lock().await;
        KeyStoreSession {
            _guard: guard,
            store: self.store.as_ref(),
        }
    }
}

impl std::fmt::Debug for SharedKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyStore").finish_non_exhaustive()
    }
}

/// Exclusive access to a [`SecureKeyStore`] for the lifetime of the session.
pub struct KeyStoreSession<'a> {
    _guard: MutexGuard<'a, ()>,
    store: &'a (dyn SecureKeyStore + 'static),
}

impl Deref for KeyStoreSession<'_> {
    type Target = dyn SecureKeyStore;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

impl std::fmt::Debug for KeyStoreSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStoreSession").finish_non_exhaustive()
    }
}
