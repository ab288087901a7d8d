//! Blob store abstraction for pluggable storage backends

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("unauthorized (HTTP {status}): {detail}")]
    Unauthorized { status: u16, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Container-level metadata returned by a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerProperties {
    pub last_modified: DateTime<Utc>,
}

/// Named byte blobs grouped into containers
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Account identity of the backend
    fn account_name(&self) -> &str;

    /// Retrieval address of a blob; computed locally, never confirmed by a read
    fn blob_url(&self, container: &str, blob: &str) -> String;

    /// Write a blob, replacing any existing blob with the same name
    async fn put_blob(
        &self,
        container: &str,
        blob: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), StorageError>;

    /// Fetch container metadata without transferring objects
    async fn container_properties(&self, container: &str)
        -> Result<ContainerProperties, StorageError>;
}
