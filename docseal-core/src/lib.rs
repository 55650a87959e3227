//! Transparent at-rest encryption for persisted documents.
//!
//! Each encrypted document owns a keyset of data-encryption keys. The keyset
//! is persisted next to the document, wrapped by a master key that never
//! leaves the platform [`SecureKeyStore`]. The first read or write of a
//! document provisions the master key and keyset as needed; later calls
//! reuse the cached AEAD.
//!
//! The main entry points are:
//!
//! - [`EncryptedStoreBuilder`] and [`encrypted_preferences_store`], which
//!   wire a [`FileDocumentStore`] to an [`EncryptedDocumentCodec`]
//! - [`AeadProvider`] and [`KeysetProvider`] for embedders with their own
//!   persistence
//!
//! Platform capabilities are injected through the traits in [`platform`].
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod aead_provider;
pub use aead_provider::AeadProvider;

pub mod codec;
pub use codec::{DocumentCodec, EncryptedDocumentCodec};

pub mod crypto;
pub use crypto::Aead;

mod error;
pub use error::*;

pub mod keyset;
pub use keyset::{EncryptedKeysetBinary, KeysetHandle, KeysetProvider, KeysetStatus};

pub mod platform;
pub use platform::{DocumentStore, SecureKeyStore, SharedKeyStore};

pub mod store;
pub use store::{
    encrypted_preferences_store, EncryptedDocumentStore, EncryptedStoreBuilder, FileDocumentStore,
    StoragePaths,
};

#[cfg(test)]
mod test_support;
