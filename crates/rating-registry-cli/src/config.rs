//! Command line configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables
//! - Command-line arguments

use config::{Config, ConfigError, Environment, File};
use rating_registry_core::FeatureSchema;
use rating_registry_pipeline::{
    IngestionSettings, PipelineSettings, TrainerSettings, ValidationSettings,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Where raw restaurant records are kept
    #[serde(default)]
    pub document_store: DocumentStoreConfig,

    #[serde(default)]
    pub schema: FeatureSchema,

    #[serde(default)]
    pub ingestion: IngestionSettings,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub trainer: TrainerSettings,

    /// Bucket sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Parent of the per-run artifact directories
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,

    /// Model registry root
    #[serde(default = "default_registry_root")]
    pub registry_root: PathBuf,

    /// Output directory of batch prediction
    #[serde(default = "default_prediction_dir")]
    pub prediction_dir: PathBuf,

    /// Input directory of scheduled batch prediction
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifact")
}

fn default_registry_root() -> PathBuf {
    PathBuf::from("saved_models")
}

fn default_prediction_dir() -> PathBuf {
    PathBuf::from("prediction")
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input_files")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            registry_root: default_registry_root(),
            prediction_dir: default_prediction_dir(),
            input_dir: default_input_dir(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Root of the JSON-lines collections
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

fn default_store_root() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

/// Bucket sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bucket name; `BUCKET_NAME` is used when unset
    #[serde(default)]
    pub bucket: Option<String>,

    /// Sync executable
    #[serde(default = "default_sync_binary")]
    pub binary: String,

    /// Endpoint URL for S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Extra attempts after a failed sync
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_sync_binary() -> String {
    "aws".to_string()
}

fn default_retries() -> u32 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            binary: default_sync_binary(),
            endpoint: None,
            retries: default_retries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default configuration file (config/default.toml)
    /// 2. Environment-specific file (config/{env}.toml)
    /// 3. Environment variables (RATING_REGISTRY__*)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();

        let config = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // e.g. RATING_REGISTRY__TRAINER__EXPECTED_SCORE=0.75
            .add_source(
                Environment::with_prefix("RATING_REGISTRY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Pipeline settings assembled from the individual sections
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            schema: self.schema.clone(),
            ingestion: self.ingestion.clone(),
            validation: self.validation.clone(),
            trainer: self.trainer.clone(),
        }
    }
}
