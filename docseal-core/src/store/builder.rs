//! Wiring of encrypted document stores.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::file::{delete_file, FileDocumentStore, ReplaceFileCorruptionHandler};
use super::paths::StoragePaths;
use crate::aead_provider::AeadProvider;
use crate::codec::{DocumentCodec, EncryptedDocumentCodec, KeysetCodec, PreferencesCodec};
use crate::error::DocsealResult;
use crate::platform::{KeysetPersistence, SharedKeyStore};

/// A file-backed document store whose contents are encrypted.
pub type EncryptedDocumentStore<C> = FileDocumentStore<EncryptedDocumentCodec<C>>;

/// Builds an [`EncryptedDocumentStore`] for the document `name`.
///
/// The document's keyset lives in the sibling `<name>_keyset` document and
/// is wrapped by `master_key_alias` with the document name as associated
/// data, so several documents may share one master key.
///
/// ```ignore
/// let store = EncryptedStoreBuilder::new("notes", Utf8Codec::default(), "notes_master_key")
///     .build(&paths, key_store.clone());
/// store.update(Box::new(|_| "hello".to_string())).await?;
/// ```
pub struct EncryptedStoreBuilder<C: DocumentCodec> {
    name: String,
    codec: C,
    master_key_alias: String,
    corruption_handler: Option<ReplaceFileCorruptionHandler<C::Value>>,
}

impl<C> EncryptedStoreBuilder<C>
where
    C: DocumentCodec,
    C::Value: Clone,
{
    /// Starts a builder for the document `name` encoded by `codec`.
    #[must_use]
    pub fn new(name: impl Into<String>, codec: C, master_key_alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codec,
            master_key_alias: master_key_alias.into(),
            corruption_handler: None,
        }
    }

    /// Replaces the document with the handler's value when it cannot be
    /// decrypted or decoded.
    #[must_use]
    pub fn corruption_handler(mut self, handler: ReplaceFileCorruptionHandler<C::Value>) -> Self {
        self.corruption_handler = Some(handler);
        self
    }

    /// Builds the store at [`StoragePaths::document_path`].
    #[must_use]
    pub fn build(self, paths: &StoragePaths, key_store: SharedKeyStore) -> EncryptedDocumentStore<C> {
        let document_path = paths.document_path(&self.name);
        self.build_at(document_path, paths, key_store)
    }

    fn build_at(
        self,
        document_path: PathBuf,
        paths: &StoragePaths,
        key_store: SharedKeyStore,
    ) -> EncryptedDocumentStore<C> {
        let keyset_persistence: Arc<KeysetPersistence> =
            Arc::new(FileDocumentStore::new(paths.keyset_path(&self.name), KeysetCodec));
        let aead_provider = Arc::new(AeadProvider::for_keyset(
            keyset_persistence,
            key_store,
            self.master_key_alias,
            self.name.into_bytes(),
        ));

        let store = FileDocumentStore::new(
            document_path,
            EncryptedDocumentCodec::new(self.codec, aead_provider),
        );
        match self.corruption_handler {
            Some(handler) => store.with_corruption_handler(handler),
            None => store,
        }
    }
}

impl<C: DocumentCodec + std::fmt::Debug> std::fmt::Debug for EncryptedStoreBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStoreBuilder")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .field("master_key_alias", &self.master_key_alias)
            .finish_non_exhaustive()
    }
}

/// Builds an encrypted [`Preferences`](crate::codec::Preferences) store at
/// [`StoragePaths::preferences_path`].
#[must_use]
pub fn encrypted_preferences_store(
    name: &str,
    master_key_alias: impl Into<String>,
    paths: &StoragePaths,
    key_store: SharedKeyStore,
    corruption_handler: Option<ReplaceFileCorruptionHandler<crate::codec::Preferences>>,
) -> EncryptedDocumentStore<PreferencesCodec> {
    let mut builder = EncryptedStoreBuilder::new(name, PreferencesCodec, master_key_alias);
    if let Some(handler) = corruption_handler {
        builder = builder.corruption_handler(handler);
    }
    builder.build_at(paths.preferences_path(name), paths, key_store)
}

/// Deletes every file of the document `name`: the document, its preferences
/// variant and its keyset. The master key is left untouched.
///
/// Store instances still open on these files keep serving their cached
/// values; drop them before wiping.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub async fn wipe_document(paths: &StoragePaths, name: &str) -> DocsealResult<()> {
    delete_file(&paths.document_path(name)).await?;
    delete_file(&paths.preferences_path(name)).await?;
    delete_file(&paths.keyset_path(name)).await?;
    info!(document = name, "wiped document and keyset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{PreferenceValue, Preferences, Utf8Codec};
    use crate::keyset::KeysetStatus;
    use crate::platform::{DocumentStore, MemoryKeyStore};

    #[tokio::test]
    async fn test_build_writes_document_and_keyset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));

        let store = EncryptedStoreBuilder::new("notes", Utf8Codec::default(), "notes_master_key")
            .build(&paths, key_store);
        store
            .update(Box::new(|_| "hello".to_string()))
            .await
            .expect("update");

        let raw = std::fs::read_to_string(paths.document_path("notes")).expect("document");
        assert!(!raw.contains("hello"));
        assert!(paths.keyset_path("notes").exists());
    }

    #[tokio::test]
    async fn test_stale_instance_keeps_committed_keyset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));
        let build = || {
            EncryptedStoreBuilder::new("notes", Utf8Codec::default(), "notes_master_key")
                .build(&paths, key_store.clone())
        };

        let stale = build();
        assert_eq!(
            stale
                .codec()
                .aead_provider()
                .keyset_provider()
                .status()
                .await
                .expect("status"),
            KeysetStatus::NotStored
        );

        build()
            .update(Box::new(|_| "hello".to_string()))
            .await
            .expect("first writer");
        let keyset = std::fs::read(paths.keyset_path("notes")).expect("keyset");

        stale
            .update(Box::new(|current| format!("{current} world")))
            .await
            .expect("second writer");
        assert_eq!(std::fs::read(paths.keyset_path("notes")).expect("keyset"), keyset);
        assert_eq!(build().read().await.expect("read"), "hello world");
    }

    #[tokio::test]
    async fn test_preferences_store_uses_preferences_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());
        let key_store = SharedKeyStore::new(Arc::new(MemoryKeyStore::new()));

        let store = encrypted_preferences_store("settings", "settings_master_key", &paths, key_store, None);
        store
            .update(Box::new(|mut preferences: Preferences| {
                preferences.set("theme", "dark");
                preferences
            }))
            .await
            .expect("update");

        assert!(paths.preferences_path("settings").exists());
        assert!(!paths.document_path("settings").exists());
        assert_eq!(
            store.read().await.expect("read").get("theme"),
            Some(&PreferenceValue::String("dark".to_string()))
        );
    }

    #[tokio::test]
    async fn test_wipe_document_keeps_master_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());
        let memory = Arc::new(MemoryKeyStore::new());
        let key_store = SharedKeyStore::new(memory.clone());

        EncryptedStoreBuilder::new("notes", Utf8Codec::default(), "notes_master_key")
            .build(&paths, key_store)
            .update(Box::new(|_| "hello".to_string()))
            .await
            .expect("update");

        wipe_document(&paths, "notes").await.expect("wipe");
        assert!(!paths.document_path("notes").exists());
        assert!(!paths.keyset_path("notes").exists());
        assert_eq!(memory.len().expect("len"), 1);
    }
}
