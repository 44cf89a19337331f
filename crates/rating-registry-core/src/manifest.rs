//! Per-version manifest written next to a promoted bundle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checksum::Checksum;
use crate::error::{RegistryError, Result};
use crate::provenance::Provenance;
use crate::types::{ArtifactKind, ModelVersion};

/// File name of the manifest inside a version directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Description of one promoted version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version number of this bundle
    pub version: ModelVersion,

    /// When the bundle was promoted
    pub promoted_at: DateTime<Utc>,

    /// Checksums of every stored artifact
    pub checksums: BTreeMap<ArtifactKind, Checksum>,

    /// Where the bundle came from
    pub provenance: Provenance,
}

impl VersionManifest {
    pub fn new(version: ModelVersion, provenance: Provenance) -> Self {
        Self {
            version,
            promoted_at: Utc::now(),
            checksums: BTreeMap::new(),
            provenance,
        }
    }

    /// Record the checksum of one artifact
    pub fn with_checksum(mut self, kind: ArtifactKind, checksum: Checksum) -> Self {
        self.checksums.insert(kind, checksum);
        self
    }

    /// Compare a freshly computed checksum against the recorded one
    pub fn verify(&self, kind: ArtifactKind, actual: &Checksum) -> Result<()> {
        let expected = self.checksums.get(&kind).ok_or_else(|| {
            RegistryError::ValidationError(format!(
                "Manifest of version {} has no checksum for {}",
                self.version, kind
            ))
        })?;

        if !expected.verify(actual) {
            return Err(RegistryError::ChecksumMismatch {
                artifact: format!("{}/{}", self.version, kind),
                expected: expected.value().to_string(),
                actual: actual.value().to_string(),
            });
        }
        Ok(())
    }
}
