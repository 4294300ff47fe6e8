//! Blob store abstraction: named binary objects, no metadata of their own.
//!
//! Conceptually a flat key-value store keyed by filename. [`FsBlobStore`]
//! backs it with a plain directory, which is what the reconciliation view
//! assumes: existence and name are a blob's only observable properties,
//! and a blob with no catalog record is an orphan.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CatalogError;

/// A named binary object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any existing blob of that name.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), CatalogError>;

    /// Whether a blob named `name` exists.
    async fn exists(&self, name: &str) -> bool;

    /// Remove the blob named `name`. Fails with
    /// [`CatalogError::BlobNotFound`] when it does not exist.
    async fn delete(&self, name: &str) -> Result<(), CatalogError>;

    /// All PDF blob names in the store, in no particular order.
    async fn list_names(&self) -> Result<Vec<String>, CatalogError>;

    /// Read a blob's bytes.
    async fn read(&self, name: &str) -> Result<Vec<u8>, CatalogError>;
}

/// Filesystem-backed blob store over one directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CatalogError::BlobIo {
                name: root.display().to_string(),
                source: e,
            })?;
        Ok(Self { root })
    }

    /// Resolve `name` inside the store root, rejecting anything that is not
    /// a bare filename. Blob names come from client uploads and delete
    /// requests; a separator or `..` must never escape the root.
    fn resolve(&self, name: &str) -> Result<PathBuf, CatalogError> {
        let is_bare = Path::new(name)
            .file_name()
            .map(|f| f == std::ffi::OsStr::new(name))
            .unwrap_or(false);
        if !is_bare || name == ".." {
            return Err(CatalogError::BlobNotFound {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), CatalogError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CatalogError::BlobIo {
                name: name.to_string(),
                source: e,
            })?;
        debug!("Stored blob '{}' ({} bytes)", name, bytes.len());
        Ok(())
    }

    async fn exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete(&self, name: &str) -> Result<(), CatalogError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::BlobNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(CatalogError::BlobIo {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    async fn list_names(&self) -> Result<Vec<String>, CatalogError> {
        let mut entries =
            tokio::fs::read_dir(&self.root)
                .await
                .map_err(|e| CatalogError::BlobIo {
                    name: self.root.display().to_string(),
                    source: e,
                })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CatalogError::BlobIo {
            name: self.root.display().to_string(),
            source: e,
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_lowercase().ends_with(".pdf") {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, CatalogError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CatalogError::BlobNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(CatalogError::BlobIo {
                name: name.to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_read_round_trip() {
        let (_dir, store) = store().await;
        store.put("scan.pdf", b"%PDF-1.4 data").await.unwrap();
        assert!(store.exists("scan.pdf").await);
        assert_eq!(store.read("scan.pdf").await.unwrap(), b"%PDF-1.4 data");
    }

    #[tokio::test]
    async fn list_names_filters_to_pdfs() {
        let (_dir, store) = store().await;
        store.put("a.pdf", b"x").await.unwrap();
        store.put("B.PDF", b"x").await.unwrap();
        store.put("notes.txt", b"x").await.unwrap();

        let mut names = store.list_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["B.PDF".to_string(), "a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn delete_missing_blob_is_not_found() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.delete("ghost.pdf").await,
            Err(CatalogError::BlobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let (_dir, store) = store().await;
        assert!(!store.exists("../escape.pdf").await);
        assert!(matches!(
            store.read("a/b.pdf").await,
            Err(CatalogError::BlobNotFound { .. })
        ));
        assert!(matches!(
            store.put("../evil.pdf", b"x").await,
            Err(CatalogError::BlobNotFound { .. })
        ));
    }
}
