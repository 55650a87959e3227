//! In-memory implementations of platform traits.
//!
//! [`MemoryKeyStore`] keeps master keys in process memory and offers none of
//! the protection of a hardware key store. It exists for tests and for
//! embedders that only need an ephemeral store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentStore, SecureKeyStore, Transform};
use crate::crypto::{Aead, SealingKey};
use crate::error::{DocsealError, DocsealResult};

// =============================================================================
// Memory Key Store
// =============================================================================

/// In-memory master key store keyed by alias.
///
/// **NOT FOR PRODUCTION**: keys live in ordinary heap memory for the
/// lifetime of the store.
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, Arc<SealingKey>>>,
}

impl MemoryKeyStore {
    /// Creates an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored master keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn len(&self) -> DocsealResult<usize> {
        Ok(self.read_keys()?.len())
    }

    /// Returns `true` if no master keys are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_empty(&self) -> DocsealResult<bool> {
        Ok(self.read_keys()?.is_empty())
    }

    fn read_keys(
        &self,
    ) -> DocsealResult<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SealingKey>>>> {
        self.keys
            .read()
            .map_err(|_| DocsealError::KeyStore("key map lock poisoned".to_string()))
    }

    fn write_keys(
        &self,
    ) -> DocsealResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SealingKey>>>> {
        self.keys
            .write()
            .map_err(|_| DocsealError::KeyStore("key map lock poisoned".to_string()))
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureKeyStore for MemoryKeyStore {
    async fn has_key(&self, alias: &str) -> DocsealResult<bool> {
        Ok(self.read_keys()?.contains_key(alias))
    }

    async fn generate_key(&self, alias: &str) -> DocsealResult<()> {
        self.write_keys()?
            .insert(alias.to_string(), Arc::new(SealingKey::generate()));
        Ok(())
    }

    async fn delete_key(&self, alias: &str) -> DocsealResult<()> {
        self.write_keys()?.remove(alias);
        Ok(())
    }

    async fn wrapping_aead(&self, alias: &str) -> DocsealResult<Arc<dyn Aead>> {
        self.read_keys()?
            .get(alias)
            .map(|key| Arc::clone(key) as Arc<dyn Aead>)
            .ok_or_else(|| DocsealError::KeyStore(format!("no master key under alias `{alias}`")))
    }
}

// =============================================================================
// Memory Document Store
// =============================================================================

/// In-memory document store holding one value behind an async mutex.
pub struct MemoryDocumentStore<T> {
    value: Mutex<T>,
}

impl<T> MemoryDocumentStore<T> {
    /// Creates a store whose current (and default) value is `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl<T: Default> Default for MemoryDocumentStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[async_trait]
impl<T> DocumentStore<T> for MemoryDocumentStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self) -> DocsealResult<T> {
        Ok(self.value.lock().await.clone())
    }

    async fn update(&self, transform: Transform<T>) -> DocsealResult<T> {
        let mut guard = self.value.lock().await;
        let next = transform(guard.clone());
        *guard = next.clone();
        drop(guard);
        Ok(next)
    }
}
