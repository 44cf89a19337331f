//! Directory-backed model registry
//!
//! The registry root holds one directory per promoted version, named by its
//! integer version number:
//!
//! ```text
//! saved_models/
//!   0/
//!     model/model.json
//!     transformer/transformer.json
//!     encoder/encoder.json
//!     manifest.json
//!   1/
//!     ...
//! ```
//!
//! Versions are kept in an ordered index built from the directory listing.
//! Names that are not plain non-negative integers (including staging
//! directories of promotions in progress) are skipped. An all-digit name
//! too large for a version number is an error, since skipping it would
//! report a lower version as the latest. A promotion writes
//! the whole bundle into a staging directory and renames it into place, so
//! a version directory is either complete or absent.

use chrono::Utc;
use rating_registry_core::{
    ArtifactKind, Checksum, ModelVersion, Provenance, RegistryError, VersionManifest,
    MANIFEST_FILE_NAME,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::io::load_object;

/// Prefix of in-progress promotion directories
const STAGING_PREFIX: &str = ".staging-";

/// Location of one object inside a bundle directory
pub fn bundle_path(dir: &Path, kind: ArtifactKind) -> PathBuf {
    dir.join(kind.dir_name()).join(kind.file_name())
}

/// Source files of a bundle about to be promoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFiles {
    pub model: PathBuf,
    pub transformer: PathBuf,
    pub encoder: PathBuf,
}

impl BundleFiles {
    /// Bundle laid out like a registry version directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: bundle_path(dir, ArtifactKind::Model),
            transformer: bundle_path(dir, ArtifactKind::Transformer),
            encoder: bundle_path(dir, ArtifactKind::Encoder),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Model => &self.model,
            ArtifactKind::Transformer => &self.transformer,
            ArtifactKind::Encoder => &self.encoder,
        }
    }
}

/// Versioned store of promoted model bundles
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
    index: BTreeSet<ModelVersion>,
}

impl ModelRegistry {
    /// Open a registry, creating the root directory if it does not exist
    #[instrument(skip(root), fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        let mut registry = Self {
            root,
            index: BTreeSet::new(),
        };
        registry.refresh()?;
        debug!(versions = registry.index.len(), "Opened model registry");
        Ok(registry)
    }

    /// Rebuild the index from the directory listing
    pub fn refresh(&mut self) -> StoreResult<()> {
        let mut index = BTreeSet::new();
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if !entry.path().is_dir() {
                warn!(entry = %name, "Skipping non-directory registry entry");
                continue;
            }
            match name.parse::<ModelVersion>() {
                Ok(version) => {
                    index.insert(version);
                }
                Err(err) if name.bytes().all(|b| b.is_ascii_digit()) => {
                    return Err(err.into());
                }
                Err(_) => warn!(entry = %name, "Skipping registry entry that is not a version"),
            }
        }
        self.index = index;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All versions in ascending order
    pub fn versions(&self) -> Vec<ModelVersion> {
        self.index.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Highest promoted version
    pub fn latest_version(&self) -> Option<ModelVersion> {
        self.index.last().copied()
    }

    /// Directory of the highest promoted version
    pub fn latest_dir(&self) -> Option<PathBuf> {
        self.latest_version().map(|v| self.version_dir(v))
    }

    /// Version the next promotion will receive
    ///
    /// # Errors
    /// Returns `InvalidVersion` when the latest version has no successor.
    pub fn next_version(&self) -> StoreResult<ModelVersion> {
        match self.latest_version() {
            Some(latest) => Ok(latest.next()?),
            None => Ok(ModelVersion::INITIAL),
        }
    }

    /// Directory the next promotion will create
    pub fn next_dir(&self) -> StoreResult<PathBuf> {
        Ok(self.version_dir(self.next_version()?))
    }

    pub fn version_dir(&self, version: ModelVersion) -> PathBuf {
        self.root.join(version.dir_name())
    }

    /// Path of an artifact inside a given version
    pub fn artifact_path(&self, version: ModelVersion, kind: ArtifactKind) -> PathBuf {
        bundle_path(&self.version_dir(version), kind)
    }

    /// Path of an artifact in the latest version
    ///
    /// # Errors
    /// Returns `ModelNotAvailable` when nothing has been promoted yet.
    pub fn latest_path(&self, kind: ArtifactKind) -> StoreResult<PathBuf> {
        let version = self.latest_version().ok_or_else(|| {
            RegistryError::ModelNotAvailable(format!(
                "no {} in registry {}",
                kind,
                self.root.display()
            ))
        })?;
        Ok(self.artifact_path(version, kind))
    }

    /// Path an artifact will have once the next version is promoted
    pub fn next_path(&self, kind: ArtifactKind) -> StoreResult<PathBuf> {
        Ok(self.artifact_path(self.next_version()?, kind))
    }

    /// Promote a bundle as the next version
    ///
    /// The files are copied into a staging directory together with a
    /// manifest, then the staging directory is renamed to the version
    /// directory. On any failure the staging directory is removed and no
    /// version appears.
    ///
    /// # Errors
    /// Returns `VersionExists` if the target directory is already present.
    /// The index is rebuilt in that case, so a retry picks the next free
    /// version.
    #[instrument(skip(self, files, provenance), fields(root = %self.root.display()))]
    pub fn promote(
        &mut self,
        files: &BundleFiles,
        provenance: Provenance,
    ) -> StoreResult<ModelVersion> {
        provenance.validate()?;

        let version = self.next_version()?;
        let target = self.version_dir(version);
        if target.exists() {
            self.refresh()?;
            return Err(StoreError::VersionExists(version.number()));
        }

        let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
        let staging = self
            .root
            .join(format!("{}{}-{}", STAGING_PREFIX, version, stamp));

        let result = Self::stage(&staging, version, files, provenance)
            .and_then(|()| Self::commit(&staging, &target, version));

        if let Err(err) = result {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(
                        staging = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging directory"
                    );
                }
            }
            if matches!(err, StoreError::VersionExists(_)) {
                self.refresh()?;
            }
            return Err(err);
        }

        self.index.insert(version);
        info!(version = %version, dir = %target.display(), "Promoted model bundle");
        Ok(version)
    }

    fn stage(
        staging: &Path,
        version: ModelVersion,
        files: &BundleFiles,
        provenance: Provenance,
    ) -> StoreResult<()> {
        let mut manifest = VersionManifest::new(version, provenance);

        for kind in ArtifactKind::ALL {
            let source = files.path(kind);
            if !source.is_file() {
                return Err(StoreError::NotFound(source.to_path_buf()));
            }

            let dest = bundle_path(staging, kind);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            fs::copy(source, &dest).map_err(|e| StoreError::io(&dest, e))?;
            manifest = manifest.with_checksum(kind, Checksum::of_file(&dest)?);
        }

        let manifest_path = staging.join(MANIFEST_FILE_NAME);
        let body = serde_json::to_string_pretty(&manifest)?;
        fs::write(&manifest_path, body).map_err(|e| StoreError::io(&manifest_path, e))?;
        Ok(())
    }

    fn commit(staging: &Path, target: &Path, version: ModelVersion) -> StoreResult<()> {
        // Another writer may have taken the version while we were staging
        if target.exists() {
            return Err(StoreError::VersionExists(version.number()));
        }
        fs::rename(staging, target).map_err(|e| {
            if target.exists() {
                StoreError::VersionExists(version.number())
            } else {
                StoreError::io(target, e)
            }
        })
    }

    /// Read the manifest of a version
    pub fn manifest(&self, version: ModelVersion) -> StoreResult<VersionManifest> {
        if !self.index.contains(&version) {
            return Err(RegistryError::ModelNotAvailable(format!(
                "version {} is not in the registry",
                version
            ))
            .into());
        }
        load_object(&self.version_dir(version).join(MANIFEST_FILE_NAME))
    }

    /// Manifests of every version in ascending order
    ///
    /// A version whose manifest is missing or unreadable maps to `None`
    /// instead of failing the whole listing.
    pub fn manifests(&self) -> Vec<(ModelVersion, Option<VersionManifest>)> {
        self.index
            .iter()
            .map(|&version| match self.manifest(version) {
                Ok(manifest) => (version, Some(manifest)),
                Err(err) => {
                    if !err.is_not_found() {
                        warn!(version = %version, error = %err, "Unreadable version manifest");
                    }
                    (version, None)
                }
            })
            .collect()
    }

    /// Recompute every artifact checksum of a version and compare it with
    /// the manifest
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn verify(&self, version: ModelVersion) -> StoreResult<VersionManifest> {
        let manifest = self.manifest(version)?;
        if manifest.version != version {
            return Err(RegistryError::ValidationError(format!(
                "manifest in directory {} describes version {}",
                version, manifest.version
            ))
            .into());
        }

        for kind in ArtifactKind::ALL {
            let path = self.artifact_path(version, kind);
            if !path.is_file() {
                return Err(StoreError::NotFound(path));
            }
            manifest.verify(kind, &Checksum::of_file(&path)?)?;
        }

        debug!(version = %version, "Verified model bundle");
        Ok(manifest)
    }
}
