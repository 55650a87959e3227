//! File-backed single-document store with atomic writes.
//!
//! # Atomic Write Pattern
//!
//! 1. Write the encoded document to `<path>.tmp` in the same directory
//! 2. `fsync` the temporary file
//! 3. Rename the temporary file over the document
//! 4. `fsync` the parent directory (Unix only)
//!
//! Readers therefore see either the previous document or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec::DocumentCodec;
use crate::error::{DocsealError, DocsealResult};
use crate::platform::{DocumentStore, Transform};

/// Produces a replacement value when a persisted document cannot be read.
///
/// The replacement is written back to disk before it is returned, so the
/// unreadable document is gone afterwards.
pub struct ReplaceFileCorruptionHandler<T> {
    produce_new_data: Box<dyn Fn(&DocsealError) -> T + Send + Sync>,
}

impl<T> ReplaceFileCorruptionHandler<T> {
    /// Creates a handler that calls `produce_new_data` with the corruption.
    #[must_use]
    pub fn new(produce_new_data: impl Fn(&DocsealError) -> T + Send + Sync + 'static) -> Self {
        Self {
            produce_new_data: Box::new(produce_new_data),
        }
    }

    fn handle(&self, err: &DocsealError) -> T {
        (self.produce_new_data)(err)
    }
}

impl<T> std::fmt::Debug for ReplaceFileCorruptionHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaceFileCorruptionHandler").finish_non_exhaustive()
    }
}

/// Stores one document at `path`, encoded with `C`.
///
/// The last loaded value is cached in memory and serves [`read`]. Every
/// [`update`] re-reads the file, so a transform always sees the committed
/// document even when another instance over the same path wrote it.
///
/// [`read`]: DocumentStore::read
/// [`update`]: DocumentStore::update
pub struct FileDocumentStore<C: DocumentCodec> {
    path: PathBuf,
    codec: C,
    corruption_handler: Option<ReplaceFileCorruptionHandler<C::Value>>,
    cached: Mutex<Option<C::Value>>,
}

impl<C: DocumentCodec> FileDocumentStore<C>
where
    C::Value: Clone,
{
    /// Creates a store for the document at `path`. Nothing is read until
    /// first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            path: path.into(),
            codec,
            corruption_handler: None,
            cached: Mutex::new(None),
        }
    }

    /// Installs a handler that replaces documents failing with
    /// [`DocsealError::Corruption`].
    #[must_use]
    pub fn with_corruption_handler(mut self, handler: ReplaceFileCorruptionHandler<C::Value>) -> Self {
        self.corruption_handler = Some(handler);
        self
    }

    /// Path of the persisted document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The codec used to encode the document.
    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Deletes the persisted document and clears the cache. Deleting an absent
    /// document succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn delete(&self) -> DocsealResult<()> {
        let mut cached = self.cached.lock().await;
        delete_file(&self.path).await?;
        *cached = None;
        drop(cached);
        Ok(())
    }

    async fn load(&self) -> DocsealResult<C::Value> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "document not found, using default");
                return Ok(self.codec.default_value());
            }
            Err(err) => {
                return Err(DocsealError::io(
                    format!("Failed to read document '{}'", self.path.display()),
                    err,
                ))
            }
        };

        match self.codec.decode(&bytes).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_corruption() => {
                let Some(handler) = &self.corruption_handler else {
                    return Err(err);
                };
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "document is corrupted, replacing it"
                );
                let replacement = handler.handle(&err);
                self.persist(&replacement).await?;
                Ok(replacement)
            }
            Err(err) => Err(err),
        }
    }

    async fn persist(&self, value: &C::Value) -> DocsealResult<()> {
        let bytes = self.codec.encode(value).await?;
        write_atomic(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), len = bytes.len(), "document written");
        Ok(())
    }
}

#[async_trait]
impl<C> DocumentStore<C::Value> for FileDocumentStore<C>
where
    C: DocumentCodec,
    C::Value: Clone,
{
    async fn read(&self) -> DocsealResult<C::Value> {
        let mut cached = self.cached.lock().await;
        if let Some(value) = cached.as_ref() {
            return Ok(value.clone());
        }
        let value = self.load().await?;
        *cached = Some(value.clone());
        drop(cached);
        Ok(value)
    }

    async fn reload(&self) -> DocsealResult<C::Value> {
        let mut cached = self.cached.lock().await;
        let value = self.load().await?;
        *cached = Some(value.clone());
        drop(cached);
        Ok(value)
    }

    async fn update(&self, transform: Transform<C::Value>) -> DocsealResult<C::Value> {
        let mut cached = self.cached.lock().await;
        let current = self.load().await?;
        let next = transform(current.clone());
        match self.persist(&next).await {
            Ok(()) => {
                *cached = Some(next.clone());
                drop(cached);
                Ok(next)
            }
            Err(err) => {
                *cached = Some(current);
                Err(err)
            }
        }
    }
}

impl<C: DocumentCodec> std::fmt::Debug for FileDocumentStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDocumentStore")
            .field("path", &self.path)
            .field("corruption_handler", &self.corruption_handler.is_some())
            .finish_non_exhaustive()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> DocsealResult<()> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).await.map_err(|err| {
            DocsealError::io(
                format!("Failed to create directory '{}'", parent.display()),
                err,
            )
        })?;
    }

    let temp_path = temp_path(path);
    let mut file = fs::File::create(&temp_path).await.map_err(|err| {
        DocsealError::io(
            format!("Failed to create temporary file '{}'", temp_path.display()),
            err,
        )
    })?;
    file.write_all(data).await.map_err(|err| {
        DocsealError::io(
            format!("Failed to write temporary file '{}'", temp_path.display()),
            err,
        )
    })?;
    file.sync_all()
        .await
        .map_err(|err| DocsealError::io("Failed to sync temporary file", err))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(DocsealError::io(
            format!(
                "Failed to rename '{}' to '{}'",
                temp_path.display(),
                path.display()
            ),
            err,
        ));
    }

    if let Some(parent) = parent {
        sync_directory(parent).await?;
    }
    Ok(())
}

pub(crate) async fn delete_file(path: &Path) -> DocsealResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                sync_directory(parent).await?;
            }
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(DocsealError::io(
            format!("Failed to delete document '{}'", path.display()),
            err,
        )),
    }
}

#[cfg(unix)]
async fn sync_directory(directory: &Path) -> DocsealResult<()> {
    let dir = fs::File::open(directory).await.map_err(|err| {
        DocsealError::io(
            format!("Failed to open directory for sync '{}'", directory.display()),
            err,
        )
    })?;
    dir.sync_all()
        .await
        .map_err(|err| DocsealError::io("Failed to fsync directory", err))
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn sync_directory(_directory: &Path) -> DocsealResult<()> {
    Ok(())
}
