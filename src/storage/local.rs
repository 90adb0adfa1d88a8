//! Local filesystem storage implementation.
//!
//! Relative URIs resolve under the storage root; absolute paths and
//! `file://` URIs are used as given. Writes go to a temporary sibling file
//! that is renamed into place, so readers never see half a document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageGateway;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a URI.
    fn path(&self, uri: &str) -> PathBuf {
        let key = uri.strip_prefix("file://").unwrap_or(uri);
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, uri: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(uri);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(uri);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    async fn read_text(&self, uri: &str) -> Result<String> {
        let bytes = self
            .read_bytes(uri)
            .await?
            .ok_or_else(|| AppError::not_found(uri.to_string()))?;
        String::from_utf8(bytes).map_err(|e| AppError::parse(format!("{uri} is not UTF-8: {e}")))
    }

    async fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        self.write_bytes(uri, text.as_bytes()).await?;
        log::debug!("Wrote {}", self.path(uri).display());
        Ok(())
    }
}
