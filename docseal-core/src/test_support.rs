//! Key store wrappers used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::crypto::Aead;
use crate::error::DocsealResult;
use crate::platform::SecureKeyStore;

/// Counts calls made to the wrapped key store.
pub struct CountingKeyStore<S> {
    inner: S,
    generate_calls: AtomicUsize,
    has_key_calls: AtomicUsize,
}

impl<S> CountingKeyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            generate_calls: AtomicUsize::new(0),
            has_key_calls: AtomicUsize::new(0),
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn has_key_calls(&self) -> usize {
        self.has_key_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: SecureKeyStore> SecureKeyStore for CountingKeyStore<S> {
    async fn has_key(&self, alias: &str) -> DocsealResult<bool> {
        self.has_key_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.has_key(alias).await
    }

    async fn generate_key(&self, alias: &str) -> DocsealResult<()> {
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

/// Delays key generation so tests can cancel a provisioning call midway.
pub struct SlowKeyStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowKeyStore<S> {
    pub const fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: SecureKeyStore> SecureKeyStore for SlowKeyStore<S> {
    async fn has_key(&self, alias: &str) -> DocsealResult<bool> {
        self.inner.has_key(alias).await
    }

    async fn generate_key(&self, alias: &str) -> DocsealResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate_key(alias).await
    }

    async fn delete_key(&self, alias: &str) -> DocsealResult<()> {
        self.inner.delete_key(alias).await
    }

    async fn wrapping_aead(&self, alias: &str) -> DocsealResult<Arc<dyn Aead>> {
        self.inner.wrapping_aead(alias).await
    }
}
