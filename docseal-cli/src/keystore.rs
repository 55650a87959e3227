//! File-backed development key store.
//!
//! **NOT FOR PRODUCTION**: master keys are written as hex files under the
//! key store directory with owner-only permissions and no hardware
//! protection. Real deployments provide a platform `SecureKeyStore`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docseal_core::crypto::{SealingKey, KEY_SIZE};
use docseal_core::{Aead, DocsealError, DocsealResult, SecureKeyStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use zeroize::Zeroizing;

const KEY_EXTENSION: &str = "key";

/// Stores one hex-encoded master key per alias in `directory`.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    directory: PathBuf,
}

impl FileKeyStore {
    /// Creates a key store rooted at `directory`. The directory is created on
    /// first key generation.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn key_path(&self, alias: &str) -> DocsealResult<PathBuf> {
        let valid = !alias.is_empty()
            && alias
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !alias.starts_with('.');
        if !valid {
            return Err(DocsealError::KeyStore(format!("invalid master key alias `{alias}`")));
        }
        Ok(self.directory.join(format!("{alias}.{KEY_EXTENSION}")))
    }

    async fn write_key(&self, path: &Path, key: &SealingKey) -> DocsealResult<()> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| key_store_error("create key store directory", &err))?;
        let encoded = Zeroizing::new(hex::encode(key.as_bytes()));

        // The key file only ever appears complete and owner-only.
        let temp_path = path.with_extension(format!("{KEY_EXTENSION}.tmp"));
        let _ = fs::remove_file(&temp_path).await;
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&temp_path)
            .await
            .map_err(|err| key_store_error("create master key file", &err))?;
        file.write_all(encoded.as_bytes())
            .await
            .map_err(|err| key_store_error("write master key", &err))?;
        file.sync_all()
            .await
            .map_err(|err| key_store_error("sync master key", &err))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(key_store_error("commit master key", &err));
        }
        Ok(())
    }
}

fn key_store_error(action: &str, err: &std::io::Error) -> DocsealError {
    DocsealError::KeyStore(format!("failed to {action}: {err}"))
}

#[async_trait]
impl SecureKeyStore for FileKeyStore {
    async fn has_key(&self, alias: &str) -> DocsealResult<bool> {
        let path = self.key_path(alias)?;
        fs::try_exists(&path)
            .await
            .map_err(|err| key_store_error("query master key", &err))
    }

    async fn generate_key(&self, alias: &str) -> DocsealResult<()> {
        let path = self.key_path(alias)?;
        self.write_key(&path, &SealingKey::generate()).await?;
        info!(alias, path = %path.display(), "generated development master key");
        Ok(())
    }

    async fn delete_key(&self, alias: &str) -> DocsealResult<()> {
        let path = self.key_path(alias)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(key_store_error("delete master key", &err)),
        }
    }

    async fn wrapping_aead(&self, alias: &str) -> DocsealResult<Arc<dyn Aead>> {
        let path = self.key_path(alias)?;
        let encoded = Zeroizing::new(
            fs::read_to_string(&path)
                .await
                .map_err(|err| key_store_error("read master key", &err))?,
        );
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        hex::decode_to_slice(encoded.trim(), bytes.as_mut_slice()).map_err(|err| {
            DocsealError::KeyStore(format!("master key `{alias}` is malformed: {err}"))
        })?;
        Ok(Arc::new(SealingKey::from_bytes(*bytes)))
    }
}
