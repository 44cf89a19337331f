//! Bucket sync through an external `aws s3 sync` process
//!
//! Every transfer is retried a configured number of times before giving up.

use rating_registry_core::{RegistryError, StorageBackend, StorageLocation};
use std::fs;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::SyncConfig;

/// Bucket prefixes the pipeline syncs with
pub const ARTIFACTS_PREFIX: &str = "artifacts";
pub const SAVED_MODELS_PREFIX: &str = "saved_models";
pub const INPUT_FILES_PREFIX: &str = "input_files";
pub const PREDICTION_FILES_PREFIX: &str = "prediction_files";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no bucket configured; set sync.bucket or BUCKET_NAME")]
    NoBucket,

    #[error("invalid sync location: {0}")]
    Location(#[from] RegistryError),

    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sync {src} -> {dst} failed after {attempts} attempts: {stderr}")]
    Failed {
        src: String,
        dst: String,
        attempts: u32,
        stderr: String,
    },

    #[error("failed to prepare {path}: {source}")]
    LocalDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Syncs local directories with prefixes of one bucket
#[derive(Debug, Clone)]
pub struct BucketSync {
    backend: StorageBackend,
    binary: String,
    retries: u32,
}

impl BucketSync {
    /// Resolve the bucket from an explicit name or the configuration
    pub fn from_config(config: &SyncConfig, bucket: Option<String>) -> SyncResult<Self> {
        let bucket = bucket
            .or_else(|| config.bucket.clone())
            .filter(|b| !b.is_empty())
            .ok_or(SyncError::NoBucket)?;
        let backend = StorageBackend::S3 {
            bucket,
            endpoint: config.endpoint.clone(),
        };
        backend.validate()?;
        Ok(Self {
            backend,
            binary: config.binary.clone(),
            retries: config.retries,
        })
    }

    fn location(&self, prefix: &str) -> SyncResult<StorageLocation> {
        Ok(StorageLocation::new(self.backend.clone(), prefix)?)
    }

    fn command(&self, src: &str, dst: &str, endpoint: Option<&str>) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(["s3", "sync", src, dst]);
        if let Some(endpoint) = endpoint {
            command.args(["--endpoint-url", endpoint]);
        }
        command
    }

    /// Run one sync, retrying on a non-zero exit
    #[instrument(skip(self, endpoint))]
    pub fn sync(&self, src: &str, dst: &str, endpoint: Option<&str>) -> SyncResult<()> {
        let attempts = self.retries + 1;
        let mut stderr = String::new();

        for attempt in 1..=attempts {
            let output = self
                .command(src, dst, endpoint)
                .output()
                .map_err(|source| SyncError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })?;
            if output.status.success() {
                info!(src, dst, attempt, "Sync completed");
                return Ok(());
            }
            stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(src, dst, attempt, status = %output.status, stderr = %stderr, "Sync failed");
        }

        Err(SyncError::Failed {
            src: src.to_string(),
            dst: dst.to_string(),
            attempts,
            stderr,
        })
    }

    fn push(&self, local: &Path, prefix: &str) -> SyncResult<()> {
        let remote = self.location(prefix)?;
        self.sync(&local.display().to_string(), &remote.uri(), remote.endpoint())
    }

    fn pull(&self, prefix: &str, local: &Path) -> SyncResult<()> {
        fs::create_dir_all(local).map_err(|source| SyncError::LocalDir {
            path: local.display().to_string(),
            source,
        })?;
        let remote = self.location(prefix)?;
        self.sync(&remote.uri(), &local.display().to_string(), remote.endpoint())
    }

    /// Upload run artifacts and the model registry
    pub fn push_artifacts(&self, artifact_dir: &Path, registry_dir: &Path) -> SyncResult<()> {
        self.push(artifact_dir, ARTIFACTS_PREFIX)?;
        self.push(registry_dir, SAVED_MODELS_PREFIX)
    }

    /// Download the model registry
    pub fn pull_models(&self, registry_dir: &Path) -> SyncResult<()> {
        self.pull(SAVED_MODELS_PREFIX, registry_dir)
    }

    /// Download batch prediction inputs
    pub fn pull_inputs(&self, input_dir: &Path) -> SyncResult<()> {
        self.pull(INPUT_FILES_PREFIX, input_dir)
    }

    /// Upload batch prediction outputs
    pub fn push_predictions(&self, prediction_dir: &Path) -> SyncResult<()> {
        self.push(prediction_dir, PREDICTION_FILES_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(binary: &str) -> SyncConfig {
        SyncConfig {
            bucket: Some("ratings".to_string()),
            binary: binary.to_string(),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_bucket_resolution() {
        let sync = BucketSync::from_config(&config("aws"), Some("override".to_string())).unwrap();
        assert_eq!(
            sync.location(SAVED_MODELS_PREFIX).unwrap().uri(),
            "s3://override/saved_models"
        );

        let sync = BucketSync::from_config(&config("aws"), None).unwrap();
        assert_eq!(
            sync.location(INPUT_FILES_PREFIX).unwrap().uri(),
            "s3://ratings/input_files"
        );

        let err = BucketSync::from_config(&SyncConfig::default(), None).unwrap_err();
        assert!(matches!(err, SyncError::NoBucket));
    }

    #[test]
    fn test_invalid_bucket_rejected() {
        let err = BucketSync::from_config(&config("aws"), Some("a/b".to_string())).unwrap_err();
        assert!(matches!(err, SyncError::Location(_)));
    }

    #[test]
    fn test_command_arguments() {
        let sync = BucketSync::from_config(&config("aws"), None).unwrap();
        let command = sync.command("s3://ratings/saved_models", "models", Some("http://minio:9000"));
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "s3",
                "sync",
                "s3://ratings/saved_models",
                "models",
                "--endpoint-url",
                "http://minio:9000"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_sync() {
        let dir = tempfile::TempDir::new().unwrap();
        let sync = BucketSync::from_config(&config("true"), None).unwrap();
        sync.pull_models(&dir.path().join("saved_models")).unwrap();
        assert!(dir.path().join("saved_models").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_sync_is_retried() {
        let sync = BucketSync::from_config(&config("false"), None).unwrap();
        let err = sync
            .push_predictions(Path::new("prediction"))
            .unwrap_err();
        match err {
            SyncError::Failed { attempts, dst, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(dst, "s3://ratings/prediction_files");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_binary() {
        let sync =
            BucketSync::from_config(&config("rating-registry-no-such-binary"), None).unwrap();
        assert!(matches!(
            sync.sync("a", "b", None),
            Err(SyncError::Spawn { .. })
        ));
    }
}
