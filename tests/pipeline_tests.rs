//! Training Pipeline Integration Tests
//!
//! Runs the full ingestion to promotion flow against an in-memory document
//! store and checks what every stage leaves on disk.

mod common;

use common::{seeded_store, test_settings, TestWorkspace};
use rating_registry_core::{ArtifactKind, ModelVersion};
use rating_registry_pipeline::{
    PipelineError, TrainerSettings, TrainingPipeline, ValidationReport,
};
use rating_registry_store::{read_csv, BundleFiles, ModelRegistry, StoreError};
use std::fs;

#[test]
fn test_first_run_promotes_version_zero() {
    let workspace = TestWorkspace::new();
    let store = seeded_store(300, 7);

    let outcome = TrainingPipeline::new(workspace.run_config("run-1", test_settings()), store)
        .run()
        .expect("training run failed");

    assert_eq!(outcome.run_id, "run-1");
    assert!(outcome.evaluation.is_model_accepted());
    assert_eq!(outcome.evaluation.improved_accuracy(), None);
    assert_eq!(outcome.pusher.version(), ModelVersion::INITIAL);

    // Ingestion: feature store without identifier columns, 70/30 split
    let feature_store = read_csv(outcome.ingestion.feature_store_file_path()).unwrap();
    assert_eq!(feature_store.len(), 300);
    for dropped in ["_id", "url", "name", "phone"] {
        assert!(!feature_store.has_column(dropped), "{dropped} was kept");
    }
    assert_eq!(read_csv(outcome.ingestion.train_file_path()).unwrap().len(), 210);
    assert_eq!(read_csv(outcome.ingestion.test_file_path()).unwrap().len(), 90);

    // Validation report is written even when no base dataset is configured
    let report: ValidationReport = serde_yaml::from_str(
        &fs::read_to_string(outcome.validation.report_file_path()).unwrap(),
    )
    .unwrap();
    assert!(report.valid);

    // Trainer scores pass the configured gates
    assert!(outcome.trainer.r2_test_score() >= 0.5);
    assert!(
        (outcome.trainer.r2_train_score() - outcome.trainer.r2_test_score()).abs() <= 0.3
    );

    // Registry holds the bundle with a verifiable manifest
    let registry = ModelRegistry::open(workspace.registry_root()).unwrap();
    assert_eq!(registry.versions(), vec![ModelVersion::INITIAL]);
    for kind in [ArtifactKind::Model, ArtifactKind::Transformer, ArtifactKind::Encoder] {
        assert!(registry.latest_path(kind).unwrap().is_file());
    }
    let manifest = registry.verify(ModelVersion::INITIAL).unwrap();
    assert_eq!(manifest.provenance.run_id, "run-1");
    assert_eq!(manifest.checksums.len(), 3);

    // Pusher keeps its own copy inside the run directory
    assert!(outcome.pusher.pusher_model_dir().starts_with(workspace.artifact_root()));
    let pushed = BundleFiles::in_dir(outcome.pusher.pusher_model_dir());
    for kind in ArtifactKind::ALL {
        assert!(pushed.path(kind).is_file());
    }
}

#[test]
fn test_identical_rerun_is_not_promoted() {
    let workspace = TestWorkspace::new();
    let store = seeded_store(300, 7);

    TrainingPipeline::new(
        workspace.run_config("run-1", test_settings()),
        store.clone(),
    )
    .run()
    .expect("first run failed");

    // Same data, same seeds: the new model scores exactly the same
    let err = TrainingPipeline::new(workspace.run_config("run-2", test_settings()), store)
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::ModelNotImproved { .. }));
    assert!(err.is_gate_failure());

    let registry = ModelRegistry::open(workspace.registry_root()).unwrap();
    assert_eq!(registry.versions(), vec![ModelVersion::INITIAL]);
}

#[test]
fn test_better_model_is_promoted_as_next_version() {
    let workspace = TestWorkspace::new();
    let store = seeded_store(300, 7);

    // A single shallow tree sets a low bar
    let mut weak = test_settings();
    weak.trainer = TrainerSettings {
        expected_score: -1.0,
        overfitting_threshold: 2.0,
        ..weak.trainer
    };
    weak.trainer.forest.n_estimators = 1;
    weak.trainer.forest.max_depth = Some(1);
    TrainingPipeline::new(workspace.run_config("weak", weak), store.clone())
        .run()
        .expect("weak run failed");

    let outcome = TrainingPipeline::new(workspace.run_config("strong", test_settings()), store)
        .run()
        .expect("strong run failed");

    assert_eq!(outcome.pusher.version(), ModelVersion::new(1));
    let improvement = outcome.evaluation.improved_accuracy().unwrap();
    assert!(improvement > 0.0);

    let registry = ModelRegistry::open(workspace.registry_root()).unwrap();
    assert_eq!(
        registry.versions(),
        vec![ModelVersion::INITIAL, ModelVersion::new(1)]
    );
    let manifest = registry.manifest(ModelVersion::new(1)).unwrap();
    assert_eq!(manifest.provenance.run_id, "strong");
    assert_eq!(manifest.provenance.improved_accuracy, Some(improvement));
}

#[test]
fn test_expected_score_gate_blocks_promotion() {
    let workspace = TestWorkspace::new();
    let mut settings = test_settings();
    settings.trainer.expected_score = 1.01;

    let err = TrainingPipeline::new(workspace.run_config("run-1", settings), seeded_store(300, 7))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::BelowExpectedScore { .. }));

    let registry = ModelRegistry::open(workspace.registry_root()).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_overfitting_gate_blocks_promotion() {
    let workspace = TestWorkspace::new();
    let mut settings = test_settings();
    settings.trainer.expected_score = 0.0;
    settings.trainer.overfitting_threshold = 0.0;

    let err = TrainingPipeline::new(workspace.run_config("run-1", settings), seeded_store(300, 7))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::Overfitting { .. }));
}

#[test]
fn test_empty_collection_fails_ingestion() {
    let workspace = TestWorkspace::new();
    let err = TrainingPipeline::new(workspace.run_config("run-1", test_settings()), seeded_store(0, 7))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset(_)));
}

#[test]
fn test_corrupted_version_fails_verification() {
    let workspace = TestWorkspace::new();
    TrainingPipeline::new(workspace.run_config("run-1", test_settings()), seeded_store(300, 7))
        .run()
        .expect("training run failed");

    let registry = ModelRegistry::open(workspace.registry_root()).unwrap();
    let model = registry.latest_path(ArtifactKind::Model).unwrap();
    fs::write(&model, b"{}").unwrap();

    let err = registry.verify(ModelVersion::INITIAL).unwrap_err();
    assert!(matches!(err, StoreError::Domain(_)), "unexpected error: {err}");
}
