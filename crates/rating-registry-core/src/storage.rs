//! Remote storage locations used for artifact sync
//!
//! The pipeline never talks to object storage directly; it hands these
//! locations to an external sync command. This module only describes where
//! things live and renders the URIs that command expects.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RegistryError, Result};

/// Supported remote storage backends
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Amazon S3 or S3-compatible storage
    S3 {
        /// S3 bucket name
        bucket: String,
        /// Optional endpoint URL for S3-compatible services
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl StorageBackend {
    /// Validate the storage backend configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            StorageBackend::S3 { bucket, endpoint } => {
                if bucket.is_empty() {
                    return Err(RegistryError::ValidationError(
                        "S3 bucket name cannot be empty".to_string(),
                    ));
                }
                if bucket.contains('/') {
                    return Err(RegistryError::ValidationError(format!(
                        "S3 bucket name cannot contain '/': {}",
                        bucket
                    )));
                }
                if let Some(ep) = endpoint {
                    Url::parse(ep).map_err(|e| {
                        RegistryError::ValidationError(format!("Invalid S3 endpoint URL: {}", e))
                    })?;
                }
                Ok(())
            }
        }
    }
}

/// A prefix inside a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// The storage backend configuration
    pub backend: StorageBackend,
    /// The prefix within the backend, without leading or trailing slashes
    pub path: String,
}

impl StorageLocation {
    /// Create a new storage location with validation
    ///
    /// # Errors
    /// Returns an error if the backend or path is invalid
    pub fn new(backend: StorageBackend, path: impl Into<String>) -> Result<Self> {
        backend.validate()?;

        let path = path.into().trim_matches('/').to_string();
        if path.is_empty() {
            return Err(RegistryError::ValidationError(
                "Storage path cannot be empty".to_string(),
            ));
        }

        Ok(Self { backend, path })
    }

    /// Render the URI the sync command understands
    pub fn uri(&self) -> String {
        match &self.backend {
            StorageBackend::S3 { bucket, .. } => format!("s3://{}/{}", bucket, self.path),
        }
    }

    /// Endpoint override for S3-compatible services
    pub fn endpoint(&self) -> Option<&str> {
        match &self.backend {
            StorageBackend::S3 { endpoint, .. } => endpoint.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3(bucket: &str, endpoint: Option<&str>) -> StorageBackend {
        StorageBackend::S3 {
            bucket: bucket.to_string(),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn test_s3_backend_validation() {
        assert!(s3("ratings", None).validate().is_ok());
        assert!(s3("", None).validate().is_err());
        assert!(s3("a/b", None).validate().is_err());
        assert!(s3("ratings", Some("not a url")).validate().is_err());
    }

    #[test]
    fn test_s3_uri_generation() {
        let location = StorageLocation::new(s3("ratings", None), "/saved_models/").unwrap();
        assert_eq!(location.uri(), "s3://ratings/saved_models");
        assert_eq!(location.endpoint(), None);

        let minio = StorageLocation::new(s3("ratings", Some("http://localhost:9000")), "artifact")
            .unwrap();
        assert_eq!(minio.endpoint(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_storage_location_empty_path() {
        assert!(StorageLocation::new(s3("ratings", None), "/").is_err());
    }
}
