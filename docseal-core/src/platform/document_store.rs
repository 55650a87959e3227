//! Single-document persistence trait.

use async_trait::async_trait;

use crate::error::DocsealResult;
use crate::keyset::EncryptedKeysetBinary;

/// Full-replace transform applied by [`DocumentStore::update`].
pub type Transform<T> = Box<dyn FnOnce(T) -> T + Send>;

/// Persistence for exactly one value of type `T`.
///
/// # Implementation Notes
///
/// - [`read`](Self::read) returns the store's default value when nothing has
///   ever been written.
/// - [`update`](Self::update) must apply the transform to the latest committed
///   value and persist the result atomically: a reader observes either the
///   complete old value or the complete new one.
/// - [`reload`](Self::reload) bypasses any cache an implementation keeps, so
///   a caller deciding whether to create state sees what is committed now.
/// - Cross-process coordination is out of scope.
#[async_trait]
pub trait DocumentStore<T: Send + 'static>: Send + Sync {
    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be loaded or decoded.
    async fn read(&self) -> DocsealResult<T>;

    /// Reads the latest committed value, bypassing any cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be loaded or decoded.
    async fn reload(&self) -> DocsealResult<T> {
        self.read().await
    }

    /// Atomically replaces the value with `transform(current)` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the current value cannot be loaded, or the new
    /// value cannot be encoded or persisted. The stored value is unchanged on
    /// error.
    async fn update(&self, transform: Transform<T>) -> DocsealResult<T>;
}

/// Persistence of the wrapped keyset. Its default value is
/// [`EncryptedKeysetBinary::EMPTY`].
pub type KeysetPersistence = dyn DocumentStore<EncryptedKeysetBinary>;
