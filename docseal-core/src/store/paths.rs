//! Storage path helpers.

use std::path::{Path, PathBuf};

const DATASTORE_DIRNAME: &str = "datastore";
const KEYSTORE_DIRNAME: &str = "keystore";
const KEYSET_SUFFIX: &str = "_keyset";
const PREFERENCES_EXTENSION: &str = "preferences";

/// Paths for encrypted documents under `<root>/datastore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
    datastore_dir: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let datastore_dir = root.join(DATASTORE_DIRNAME);
        Self {
            root,
            datastore_dir,
        }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding every document.
    #[must_use]
    pub fn datastore_dir(&self) -> &Path {
        &self.datastore_dir
    }

    /// Returns the path of the document named `name`.
    #[must_use]
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.datastore_dir.join(name)
    }

    /// Returns the path of the keyset document paired with `name`.
    #[must_use]
    pub fn keyset_path(&self, name: &str) -> PathBuf {
        self.datastore_dir.join(format!("{name}{KEYSET_SUFFIX}"))
    }

    /// Returns the path of the preferences document named `name`.
    #[must_use]
    pub fn preferences_path(&self, name: &str) -> PathBuf {
        self.datastore_dir
            .join(format!("{name}.{PREFERENCES_EXTENSION}"))
    }

    /// Returns the directory used by the development key store.
    #[must_use]
    pub fn keystore_dir(&self) -> PathBuf {
        self.root.join(KEYSTORE_DIRNAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = StoragePaths::new("/data");
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.datastore_dir(), Path::new("/data/datastore"));
        assert_eq!(paths.document_path("notes"), Path::new("/data/datastore/notes"));
        assert_eq!(
            paths.keyset_path("notes"),
            Path::new("/data/datastore/notes_keyset")
        );
        assert_eq!(
            paths.preferences_path("settings"),
            Path::new("/data/datastore/settings.preferences")
        );
        assert_eq!(paths.keystore_dir(), Path::new("/data/keystore"));
    }
}
