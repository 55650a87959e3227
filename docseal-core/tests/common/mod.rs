//! Common test utilities shared across integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docseal_core::platform::MemoryKeyStore;
use docseal_core::{Aead, DocsealResult, SecureKeyStore, SharedKeyStore, StoragePaths};
use uuid::Uuid;

/// Key store that counts `generate_key` calls and can delay them.
pub struct CountingKeyStore {
    inner: MemoryKeyStore,
    generate_calls: AtomicUsize,
    generate_delay: Option<Duration>,
}

impl CountingKeyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryKeyStore::new(),
            generate_calls: AtomicUsize::new(0),
            generate_delay: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_generate_delay(delay: Duration) -> Self {
        Self {
            generate_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

impl Default for CountingKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureKeyStore for CountingKeyStore {
    async fn has_key(&self, alias: &str) -> DocsealResult<bool> {
        self.inner.has_key(alias).await
    }

    async fn generate_key(&self, alias: &str) -> DocsealResult<()> {
        if let Some(delay) = self.generate_delay {
            tokio::time::sleep(delay).await;
        }
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_key(alias).await
    }

    async fn delete_key(&self, alias: &str) -> DocsealResult<()> {
        self.inner.delete_key(alias).await
    }

    async fn wrapping_aead(&self, alias: &str) -> DocsealResult<Arc<dyn Aead>> {
        self.inner.wrapping_aead(alias).await
    }
}

/// A counting key store together with the shared handle wrapping it.
pub fn shared_counting_key_store() -> (Arc<CountingKeyStore>, SharedKeyStore) {
    let store = Arc::new(CountingKeyStore::new());
    let shared = SharedKeyStore::new(store.clone());
    (store, shared)
}

pub fn temp_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("docseal-test-{}", Uuid::new_v4()));
    path
}

pub fn cleanup_storage(root: &Path) {
    let _ = std::fs::remove_dir_all(StoragePaths::new(root).root());
}
