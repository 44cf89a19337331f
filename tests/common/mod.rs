//! Common test utilities and helpers
//!
//! This module provides a synthetic restaurant dataset, a temporary
//! workspace laid out like a deployment, and pipeline settings small enough
//! for tests to train in well under a second.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rating_registry_core::{Cell, FeatureSchema, Table};
use rating_registry_pipeline::{
    ForestParams, IngestionSettings, PipelineSettings, TrainerSettings, TrainingPipelineConfig,
    ValidationSettings,
};
use rating_registry_store::{Document, DocumentStore, MemoryDocumentStore};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const DATABASE: &str = "Zomato";
pub const COLLECTION: &str = "Restaurant";

pub const LOCATIONS: [&str; 4] = ["BTM", "Banashankari", "Indiranagar", "Koramangala"];
pub const REST_TYPES: [&str; 3] = ["Cafe", "Casual Dining", "Quick Bites"];
pub const CUISINES: [&str; 3] = ["Chinese", "North Indian", "South Indian"];

/// One synthetic restaurant
#[derive(Debug, Clone)]
pub struct Restaurant {
    pub online_order: &'static str,
    pub book_table: &'static str,
    pub location: &'static str,
    pub rest_type: &'static str,
    pub cuisines: &'static str,
    pub approx_cost: f64,
    pub votes: u32,
}

impl Restaurant {
    /// Rating as a deterministic function of the features
    pub fn rating(&self) -> f64 {
        let mut rate = 2.8;
        if self.online_order == "Yes" {
            rate += 0.3;
        }
        if self.book_table == "Yes" {
            rate += 0.4;
        }
        rate += match self.location {
            "Indiranagar" => 0.4,
            "Koramangala" => 0.3,
            "BTM" => 0.1,
            _ => 0.0,
        };
        rate += match self.rest_type {
            "Casual Dining" => 0.2,
            "Cafe" => 0.1,
            _ => 0.0,
        };
        rate += f64::from(self.votes) / 2000.0;
        (rate * 10.0).round() / 10.0
    }

    pub fn to_document(&self) -> Document {
        let value = json!({
            "url": format!("https://example.com/{}", self.location),
            "name": format!("{} {}", self.cuisines, self.rest_type),
            "phone": "080 1234567",
            "online_order": self.online_order,
            "book_table": self.book_table,
            "location": self.location,
            "rest_type": self.rest_type,
            "cuisines": self.cuisines,
            "approx_cost": self.approx_cost,
            "votes": self.votes,
            "rate": self.rating(),
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!("json! object literal"),
        }
    }
}

/// Seeded sample of restaurants
pub fn restaurants(n: usize, seed: u64) -> Vec<Restaurant> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Restaurant {
            online_order: if rng.gen_bool(0.6) { "Yes" } else { "No" },
            book_table: if rng.gen_bool(0.3) { "Yes" } else { "No" },
            location: LOCATIONS[rng.gen_range(0..LOCATIONS.len())],
            rest_type: REST_TYPES[rng.gen_range(0..REST_TYPES.len())],
            cuisines: CUISINES[rng.gen_range(0..CUISINES.len())],
            approx_cost: f64::from(rng.gen_range(2..12u32) * 100),
            votes: rng.gen_range(0..5u32) * 100,
        })
        .collect()
}

/// Table of restaurants without the target, as a batch input file has
pub fn input_table(restaurants: &[Restaurant]) -> Table {
    let mut table = Table::new(
        [
            "online_order",
            "book_table",
            "location",
            "rest_type",
            "cuisines",
            "approx_cost",
            "votes",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    );
    for r in restaurants {
        table
            .push_row(vec![
                Cell::Text(r.online_order.to_string()),
                Cell::Text(r.book_table.to_string()),
                Cell::Text(r.location.to_string()),
                Cell::Text(r.rest_type.to_string()),
                Cell::Text(r.cuisines.to_string()),
                Cell::Number(r.approx_cost),
                Cell::Number(f64::from(r.votes)),
            ])
            .expect("row width matches header");
    }
    table
}

/// Store seeded with `n` restaurants
pub fn seeded_store(n: usize, seed: u64) -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    let documents = restaurants(n, seed)
        .iter()
        .map(Restaurant::to_document)
        .collect();
    store
        .insert_many(DATABASE, COLLECTION, documents)
        .expect("Failed to seed store");
    store
}

/// Settings that train a small forest and accept its scores
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        schema: FeatureSchema::default(),
        ingestion: IngestionSettings {
            database: DATABASE.to_string(),
            collection: COLLECTION.to_string(),
            test_size: 0.3,
            seed: 42,
        },
        validation: ValidationSettings {
            base_file_path: None,
            ..ValidationSettings::default()
        },
        trainer: TrainerSettings {
            expected_score: 0.5,
            overfitting_threshold: 0.3,
            forest: ForestParams {
                n_estimators: 10,
                max_depth: Some(12),
                ..ForestParams::default()
            },
            ..TrainerSettings::default()
        },
    }
}

/// Temporary directory laid out like a deployment
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.path().join("artifact")
    }

    pub fn registry_root(&self) -> PathBuf {
        self.path().join("saved_models")
    }

    pub fn prediction_dir(&self) -> PathBuf {
        self.path().join("prediction")
    }

    /// Configuration of one run
    pub fn run_config(&self, run_id: &str, settings: PipelineSettings) -> TrainingPipelineConfig {
        TrainingPipelineConfig::with_run_id(
            self.artifact_root(),
            run_id,
            self.registry_root(),
            settings,
        )
        .expect("Failed to build run configuration")
    }
}
