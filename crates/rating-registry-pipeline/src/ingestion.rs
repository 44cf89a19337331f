//! Data ingestion stage
//!
//! Reads the restaurant collection from the document store, drops columns
//! with no predictive value, writes the feature store CSV and splits it
//! into train and test CSVs.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rating_registry_core::{DataIngestionArtifact, Table};
use rating_registry_store::{collection_as_table, write_csv, DocumentStore};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::DataIngestionConfig;
use crate::error::{PipelineError, PipelineResult};

/// Shuffle rows with a seeded generator and hold out `ceil(n * test_size)`
/// of them for testing
pub fn train_test_split(
    table: &Table,
    test_size: f64,
    seed: u64,
) -> PipelineResult<(Table, Table)> {
    let n = table.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::EmptyDataset(format!(
            "{} rows cannot be split with test_size {}",
            n, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((table.take_rows(train_idx), table.take_rows(test_idx)))
}

/// Data ingestion stage
pub struct DataIngestion {
    config: DataIngestionConfig,
    store: Arc<dyn DocumentStore>,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    #[instrument(skip(self), fields(
        database = %self.config.settings.database,
        collection = %self.config.settings.collection
    ))]
    pub fn initiate_data_ingestion(&self) -> PipelineResult<DataIngestionArtifact> {
        let settings = &self.config.settings;
        let table = collection_as_table(
            self.store.as_ref(),
            &settings.database,
            &settings.collection,
        )?;
        if table.is_empty() {
            return Err(PipelineError::EmptyDataset(format!(
                "collection {}/{} has no documents",
                settings.database, settings.collection
            )));
        }

        let table = table.drop_columns(self.config.features_to_drop.as_slice());
        write_csv(&self.config.feature_store_file_path, &table)?;
        info!(
            rows = table.len(),
            columns = table.columns().len(),
            path = %self.config.feature_store_file_path.display(),
            "Saved feature store"
        );

        let (train, test) = train_test_split(&table, settings.test_size, settings.seed)?;
        write_csv(&self.config.train_file_path, &train)?;
        write_csv(&self.config.test_file_path, &test)?;
        info!(train_rows = train.len(), test_rows = test.len(), "Split dataset");

        Ok(DataIngestionArtifact::new(
            &self.config.feature_store_file_path,
            &self.config.train_file_path,
            &self.config.test_file_path,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestionSettings;
    use rating_registry_core::Cell;
    use rating_registry_store::{read_csv, MemoryDocumentStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn numbered_table(n: usize) -> Table {
        let mut table = Table::new(vec!["id".into()]);
        for i in 0..n {
            table.push_row(vec![Cell::Number(i as f64)]).unwrap();
        }
        table
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let table = numbered_table(10);
        let (train, test) = train_test_split(&table, 0.3, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);

        let mut ids: Vec<f64> = train
            .numeric_values("id")
            .unwrap()
            .into_iter()
            .chain(test.numeric_values("id").unwrap())
            .collect();
        ids.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(ids, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        let table = numbered_table(50);
        let a = train_test_split(&table, 0.3, 42).unwrap();
        let b = train_test_split(&table, 0.3, 42).unwrap();
        let c = train_test_split(&table, 0.3, 7).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.1, c.1);
    }

    #[test]
    fn test_split_needs_two_rows() {
        assert!(train_test_split(&numbered_table(1), 0.3, 42).is_err());
    }

    fn config(dir: &TempDir) -> DataIngestionConfig {
        DataIngestionConfig {
            feature_store_file_path: dir.path().join("feature_store/zomato.csv"),
            train_file_path: dir.path().join("datasets/train.csv"),
            test_file_path: dir.path().join("datasets/test.csv"),
            settings: IngestionSettings::default(),
            features_to_drop: vec!["url".into(), "name".into()],
        }
    }

    #[test]
    fn test_ingestion_writes_feature_store_and_splits() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let docs = (0..10)
            .map(|i| {
                json!({"url": "http://x", "name": format!("r{}", i), "rate": 3.0 + i as f64 / 10.0})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        store.insert_many("Zomato", "Restaurant", docs).unwrap();

        let artifact = DataIngestion::new(config(&dir), store)
            .initiate_data_ingestion()
            .unwrap();

        let feature_store = read_csv(artifact.feature_store_file_path()).unwrap();
        assert_eq!(feature_store.columns(), ["rate"]);
        assert_eq!(feature_store.len(), 10);
        assert_eq!(read_csv(artifact.train_file_path()).unwrap().len(), 7);
        assert_eq!(read_csv(artifact.test_file_path()).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_collection_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let err = DataIngestion::new(config(&dir), store)
            .initiate_data_ingestion()
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset(_)));
    }
}
