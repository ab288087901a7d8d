//! Storage connectivity probe

use super::traits::{BlobStore, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub container: String,
    pub last_modified: DateTime<Utc>,
    pub account_name: String,
    pub test_time: DateTime<Utc>,
}

/// Verifies credentials and reachability by reading container metadata
#[derive(Clone)]
pub struct StorageProber {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl StorageProber {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub async fn probe(&self) -> Result<StorageInfo, StorageError> {
        let props = self.store.container_properties(&self.container).await?;

        Ok(StorageInfo {
            container: self.container.clone(),
            last_modified: props.last_modified,
            account_name: self.store.account_name().to_string(),
            test_time: Utc::now(),
        })
    }
}
