//! Provenance of a promoted model bundle
//!
//! Records which training run produced a bundle and how it scored, so a
//! registry version can be traced back to its artifact directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RegistryError, Result};

/// Provenance information for a model bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Identifier of the training run (its artifact directory name)
    pub run_id: String,

    /// R² on the training split
    pub r2_train_score: f64,

    /// R² on the held-out split
    pub r2_test_score: f64,

    /// Improvement over the previously promoted bundle, if there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_accuracy: Option<f64>,

    /// Timestamp when the bundle was produced
    pub created_at: DateTime<Utc>,

    /// Free-form metadata (hyper-parameters, row counts, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Provenance {
    /// Start building a provenance record for a run
    pub fn builder(run_id: impl Into<String>) -> ProvenanceBuilder {
        ProvenanceBuilder::new(run_id)
    }

    /// Validate the provenance information
    pub fn validate(&self) -> Result<()> {
        if self.run_id.is_empty() {
            return Err(RegistryError::ValidationError(
                "Run id cannot be empty".to_string(),
            ));
        }
        if !self.r2_train_score.is_finite() || !self.r2_test_score.is_finite() {
            return Err(RegistryError::ValidationError(
                "Scores must be finite numbers".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Provenance(run={}, train_r2={:.4}, test_r2={:.4}",
            self.run_id, self.r2_train_score, self.r2_test_score
        )?;
        if let Some(improved) = self.improved_accuracy {
            write!(f, ", improved={:.4}", improved)?;
        }
        write!(f, ")")
    }
}

/// Builder for creating Provenance instances
pub struct ProvenanceBuilder {
    provenance: Provenance,
}

impl ProvenanceBuilder {
    /// Create a new builder
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            provenance: Provenance {
                run_id: run_id.into(),
                r2_train_score: 0.0,
                r2_test_score: 0.0,
                improved_accuracy: None,
                created_at: Utc::now(),
                metadata: BTreeMap::new(),
            },
        }
    }

    /// Set the train and test scores
    pub fn scores(mut self, train: f64, test: f64) -> Self {
        self.provenance.r2_train_score = train;
        self.provenance.r2_test_score = test;
        self
    }

    /// Set the improvement over the previous bundle
    pub fn improved_accuracy(mut self, improved: Option<f64>) -> Self {
        self.provenance.improved_accuracy = improved;
        self
    }

    /// Add a metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provenance.metadata.insert(key.into(), value.into());
        self
    }

    /// Build and validate the provenance record
    pub fn build(self) -> Result<Provenance> {
        self.provenance.validate()?;
        Ok(self.provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let provenance = Provenance::builder("101626__120000")
            .scores(0.95, 0.91)
            .improved_accuracy(Some(0.02))
            .metadata("n_estimators", "100")
            .build()
            .unwrap();

        assert_eq!(provenance.run_id, "101626__120000");
        assert_eq!(provenance.metadata["n_estimators"], "100");
        assert!(provenance.to_string().contains("improved=0.0200"));
    }

    #[test]
    fn test_rejects_empty_run_id() {
        assert!(Provenance::builder("").scores(0.9, 0.9).build().is_err());
    }

    #[test]
    fn test_rejects_nan_scores() {
        assert!(Provenance::builder("run").scores(f64::NAN, 0.9).build().is_err());
    }
}
