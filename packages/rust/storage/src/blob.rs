//! Blob storage for uploaded syllabus documents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use syllatrack_shared::{Result, SyllatrackError};

/// Named binary objects inside a single container.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist yet.
    async fn ensure_container(&self) -> Result<()>;

    /// Write `bytes` under `name`, replacing any previous content.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Read the blob stored under `name`.
    async fn get(&self, name: &str) -> Result<Vec<u8>>;
}

/// A [`BlobStore`] backed by one directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a blob name to a path, refusing anything that is not a plain file name.
    fn blob_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(SyllatrackError::validation(format!(
                "invalid blob name '{name}'"
            )));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn ensure_container(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SyllatrackError::io(&self.root, e))
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SyllatrackError::io(&path, e))?;
        tracing::debug!(blob = name, bytes = bytes.len(), "blob written");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SyllatrackError::NotFound(format!("blob '{name}'")))
            }
            Err(e) => Err(SyllatrackError::io(&path, e)),
        }
    }
}
