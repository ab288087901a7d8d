//! Artifact uploader

use super::traits::{BlobStore, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{info, warn};

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Uploads local artifacts into one container
#[derive(Clone)]
pub struct StorageUploader {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl StorageUploader {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// Upload `local` as `remote_name` and return its retrieval address.
    ///
    /// The local file is removed on success; on failure it is removed when
    /// `local` is dropped.
    pub async fn upload(&self, local: TempPath, remote_name: &str) -> Result<String, StorageError> {
        let data = tokio::fs::read(&local).await?;
        let size = data.len();

        self.store
            .put_blob(&self.container, remote_name, JPEG_CONTENT_TYPE, Bytes::from(data))
            .await?;

        let url = self.store.blob_url(&self.container, remote_name);
        info!("Uploaded {} ({} bytes) to {}", remote_name, size, url);

        if let Err(e) = local.close() {
            warn!("Failed to remove local artifact {}: {}", remote_name, e);
        }

        Ok(url)
    }
}
