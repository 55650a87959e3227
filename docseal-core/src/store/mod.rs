//! File-backed document stores and the wiring of encrypted documents.

mod builder;
mod file;
mod paths;

pub use builder::{
    encrypted_preferences_store, wipe_document, EncryptedDocumentStore, EncryptedStoreBuilder,
};
pub use file::{FileDocumentStore, ReplaceFileCorruptionHandler};
pub use paths::StoragePaths;
