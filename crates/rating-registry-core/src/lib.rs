//! Core domain models and types for the rating registry
//!
//! This crate contains the data structures shared by the store, the
//! training pipeline and the command line: model versions, artifact
//! records, checksums, manifests, the feature schema and the in-memory
//! table every stage reads and writes.

pub mod artifact;
pub mod checksum;
pub mod error;
pub mod manifest;
pub mod provenance;
pub mod schema;
pub mod storage;
pub mod table;
pub mod types;

// Re-exports for convenience
pub use artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact,
};
pub use checksum::{Checksum, HashAlgorithm};
pub use error::{RegistryError, Result};
pub use manifest::{VersionManifest, MANIFEST_FILE_NAME};
pub use provenance::Provenance;
pub use schema::FeatureSchema;
pub use storage::{StorageBackend, StorageLocation};
pub use table::{Cell, Table};
pub use types::{ArtifactKind, ModelVersion};
