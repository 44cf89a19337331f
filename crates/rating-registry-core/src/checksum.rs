//! Checksums for promoted artifacts
//!
//! Every file written into a registry version is hashed and the digest is
//! recorded in the version manifest, so a bundle can be verified before it
//! is served.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::error::{RegistryError, Result};

/// Supported hashing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashAlgorithm {
    /// SHA-256
    #[default]
    SHA256,
}

/// Checksum of a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// The hashing algorithm used
    pub algorithm: HashAlgorithm,
    /// The hash value as a lowercase hexadecimal string
    pub value: String,
}

impl Checksum {
    /// Hash a byte slice with SHA-256
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self {
            algorithm: HashAlgorithm::SHA256,
            value: format!("{:x}", hasher.finalize()),
        }
    }

    /// Hash a file's contents with SHA-256, streaming it in chunks
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path).map_err(|e| {
            RegistryError::IoError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(Self {
            algorithm: HashAlgorithm::SHA256,
            value: format!("{:x}", hasher.finalize()),
        })
    }

    /// Returns true if both the algorithm and value match exactly
    pub fn verify(&self, other: &Checksum) -> bool {
        self.algorithm == other.algorithm && self.value == other.value
    }

    /// Get a reference to the hash value
    pub fn value(&self) -> &str {
        &self.value
    }
}
