//! Platform abstraction traits.
//!
//! The keyset lifecycle depends on two platform-provided capabilities:
//!
//! - [`SecureKeyStore`]: hardware-backed master keys that wrap keysets
//! - [`DocumentStore`]: single-document persistence with atomic full-replace updates
//!
//! # Platform Implementations
//!
//! - Android: Android Keystore with hardware-backed AES-GCM keys
//! - iOS: Keychain / Secure Enclave
//! - Desktop and tests: [`memory`] implementations, or a file-backed
//!   development key store (see the `docseal` CLI)

mod document_store;
mod keystore;
pub mod memory;

pub use document_store::{DocumentStore, KeysetPersistence, Transform};
pub use keystore::{KeyStoreSession, SecureKeyStore, SharedKeyStore};

pub use memory::{MemoryDocumentStore, MemoryKeyStore};
