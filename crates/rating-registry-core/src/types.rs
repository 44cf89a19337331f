//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Integer version of a promoted model bundle
///
/// Versions are the directory names of the registry. They are ordered
/// numerically, so `10` sorts after `9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(u64);

impl ModelVersion {
    /// The version assigned to the first promoted bundle
    pub const INITIAL: ModelVersion = ModelVersion(0);

    /// Create a version from its number
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Get the version number
    pub fn number(&self) -> u64 {
        self.0
    }

    /// The version that follows this one
    ///
    /// # Errors
    /// Returns `InvalidVersion` when this is the largest representable version.
    pub fn next(&self) -> crate::error::Result<Self> {
        self.0.checked_add(1).map(Self).ok_or_else(|| {
            RegistryError::InvalidVersion(format!("version {} has no successor", self.0))
        })
    }

    /// Directory name of this version inside the registry
    pub fn dir_name(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModelVersion {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only plain decimal names count; "+1" or " 1" are not version dirs
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(RegistryError::InvalidVersion(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| RegistryError::InvalidVersion(format!("{}: {}", s, e)))
    }
}

/// Kind of object stored in a registry version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Trained regression model
    Model,
    /// One-hot transformer for nominal features
    Transformer,
    /// Label encoder for ordinal features
    Encoder,
}

impl ArtifactKind {
    /// All artifact kinds in promotion order
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Model,
        ArtifactKind::Transformer,
        ArtifactKind::Encoder,
    ];

    /// Sub-directory holding this kind inside a version directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Transformer => "transformer",
            Self::Encoder => "encoder",
        }
    }

    /// File name of the serialized object
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Model => "model.json",
            Self::Transformer => "transformer.json",
            Self::Encoder => "encoder.json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for ArtifactKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "transformer" => Ok(Self::Transformer),
            "encoder" => Ok(Self::Encoder),
            _ => Err(RegistryError::ValidationError(format!(
                "Invalid artifact kind: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering_is_numeric() {
        let nine: ModelVersion = "9".parse().unwrap();
        let ten: ModelVersion = "10".parse().unwrap();
        assert!(ten > nine);
        assert_eq!(nine.next().unwrap(), ten);
    }

    #[test]
    fn test_version_at_upper_bound_has_no_successor() {
        let max: ModelVersion = u64::MAX.to_string().parse().unwrap();
        assert_eq!(max.number(), u64::MAX);
        assert!(matches!(max.next(), Err(RegistryError::InvalidVersion(_))));

        // Past u32 range still parses
        let big: ModelVersion = "4294967296".parse().unwrap();
        assert_eq!(big.next().unwrap().number(), 4_294_967_297);

        assert!("18446744073709551616".parse::<ModelVersion>().is_err());
    }

    #[test]
    fn test_version_rejects_non_numeric_names() {
        assert!("latest".parse::<ModelVersion>().is_err());
        assert!("".parse::<ModelVersion>().is_err());
        assert!("+1".parse::<ModelVersion>().is_err());
        assert!(".staging-3".parse::<ModelVersion>().is_err());
    }

    #[test]
    fn test_artifact_kind_layout() {
        assert_eq!(ArtifactKind::Model.dir_name(), "model");
        assert_eq!(ArtifactKind::Transformer.file_name(), "transformer.json");
        assert_eq!("encoder".parse::<ArtifactKind>().unwrap(), ArtifactKind::Encoder);
    }
}
