//! Object storage for capture artifacts
//!
//! This module handles:
//! - Parsing the storage account connection string
//! - Signed REST calls against the blob backend
//! - Uploading artifacts and removing the local copy
//! - Connectivity probes that transfer no objects

mod account;
mod azure;
mod prober;
mod traits;
mod uploader;

pub use account::StorageAccount;
pub use azure::AzureBlobStore;
pub use prober::StorageProber;
pub use traits::{BlobStore, ContainerProperties, StorageError};
pub use uploader::StorageUploader;
