//! Storage gateway for the static catalog.
//!
//! Documents are opaque text blobs addressed by URI. `s3://bucket/key`
//! URIs go to object storage; anything else is a filesystem path.
//!
//! ## Layout
//!
//! ```text
//! {base}/
//! ├── catalog.json                  # Root catalog
//! └── PROVIDER/
//!     ├── catalog.json
//!     └── COLLECTION/
//!         ├── collection.json
//!         └── 2023/06/15/           # Generated subcatalogs
//!             ├── catalog.json
//!             └── ITEM/ITEM.json
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::utils::uri;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Read/write access to text documents by URI.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Read a whole document. Missing documents are `NotFound`.
    async fn read_text(&self, uri: &str) -> Result<String>;

    /// Create or replace a document.
    async fn write_text(&self, uri: &str, text: &str) -> Result<()>;
}

/// Routes each URI to the backend its scheme names.
pub struct UriStorage {
    local: LocalStorage,
    #[cfg(feature = "s3")]
    s3: Option<S3Storage>,
}

impl UriStorage {
    /// Filesystem-only routing.
    pub fn local() -> Self {
        Self {
            local: LocalStorage::new("."),
            #[cfg(feature = "s3")]
            s3: None,
        }
    }

    /// Routing with an S3 client from the environment when built with `s3`.
    pub async fn from_env() -> Result<Self> {
        #[cfg(feature = "s3")]
        {
            let s3 = S3Storage::from_env().await?;
            Ok(Self {
                local: LocalStorage::new("."),
                s3: Some(s3),
            })
        }
        #[cfg(not(feature = "s3"))]
        {
            Ok(Self::local())
        }
    }

    fn backend(&self, target: &str) -> Result<&dyn StorageGateway> {
        match uri::scheme(target) {
            None | Some("file") => Ok(&self.local),
            #[cfg(feature = "s3")]
            Some("s3") => self
                .s3
                .as_ref()
                .map(|s| s as &dyn StorageGateway)
                .ok_or_else(|| AppError::config("S3 storage is not configured")),
            Some(other) => Err(AppError::config(format!(
                "no storage backend for '{other}://' URIs"
            ))),
        }
    }
}

#[async_trait]
impl StorageGateway for UriStorage {
    async fn read_text(&self, uri: &str) -> Result<String> {
        self.backend(uri)?.read_text(uri).await
    }

    async fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        self.backend(uri)?.write_text(uri, text).await
    }
}
