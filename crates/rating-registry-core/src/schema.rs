//! Feature schema of the rating dataset

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Which columns play which role in training and prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Dependent variable
    #[serde(default = "default_target")]
    pub target_column: String,

    /// Columns removed at ingestion (identifiers, free text)
    #[serde(default = "default_drop")]
    pub features_to_drop: Vec<String>,

    /// One-hot encoded categorical columns
    #[serde(default = "default_nominal")]
    pub nominal_features: Vec<String>,

    /// Label encoded categorical columns
    #[serde(default = "default_ordinal")]
    pub ordinal_features: Vec<String>,
}

fn default_target() -> String {
    "rate".to_string()
}

fn default_drop() -> Vec<String> {
    [
        "_id",
        "url",
        "name",
        "address",
        "phone",
        "listed_in(type)",
        "reviews_list",
        "menu_item",
        "dish_liked",
        "listed_in(city)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_nominal() -> Vec<String> {
    vec![
        "location".to_string(),
        "cuisines".to_string(),
        "rest_type".to_string(),
    ]
}

fn default_ordinal() -> Vec<String> {
    vec!["online_order".to_string(), "book_table".to_string()]
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            target_column: default_target(),
            features_to_drop: default_drop(),
            nominal_features: default_nominal(),
            ordinal_features: default_ordinal(),
        }
    }
}

impl FeatureSchema {
    /// Columns that must exist for training
    pub fn required_columns(&self) -> Vec<&str> {
        std::iter::once(self.target_column.as_str())
            .chain(self.nominal_features.iter().map(String::as_str))
            .chain(self.ordinal_features.iter().map(String::as_str))
            .collect()
    }

    /// True if the column is label or one-hot encoded
    pub fn is_categorical(&self, column: &str) -> bool {
        self.nominal_features.iter().any(|c| c == column)
            || self.ordinal_features.iter().any(|c| c == column)
    }

    /// Reject schemas where a column has two roles
    pub fn validate(&self) -> Result<()> {
        if self.target_column.is_empty() {
            return Err(RegistryError::ValidationError(
                "Target column cannot be empty".to_string(),
            ));
        }

        let mut seen: Vec<&str> = Vec::new();
        for column in self.required_columns() {
            if seen.contains(&column) {
                return Err(RegistryError::ValidationError(format!(
                    "Column {} is assigned more than one role",
                    column
                )));
            }
            if self.features_to_drop.iter().any(|c| c == column) {
                return Err(RegistryError::ValidationError(format!(
                    "Column {} is both used and dropped",
                    column
                )));
            }
            seen.push(column);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = FeatureSchema::default();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.required_columns().len(), 6);
        assert!(schema.is_categorical("book_table"));
        assert!(!schema.is_categorical("votes"));
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let mut schema = FeatureSchema::default();
        schema.ordinal_features.push("location".to_string());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_dropped_target_rejected() {
        let mut schema = FeatureSchema::default();
        schema.features_to_drop.push("rate".to_string());
        assert!(schema.validate().is_err());
    }
}
