//! Store Integration Tests
//!
//! Loads a CSV export into the file-backed document store, trains from it
//! and checks the registry as a later process would see it.

mod common;

use common::{restaurants, test_settings, TestWorkspace, COLLECTION, DATABASE};
use rating_registry_core::{Cell, ModelVersion, Table};
use rating_registry_pipeline::TrainingPipeline;
use rating_registry_store::{
    collection_as_table, drop_collection, dump_csv, write_csv, DocumentStore, FileDocumentStore,
    ModelRegistry,
};
use std::fs;
use std::sync::Arc;

fn export(workspace: &TestWorkspace, n: usize) -> std::path::PathBuf {
    let documents: Vec<_> = restaurants(n, 7).iter().map(|r| r.to_document()).collect();
    let path = workspace.path().join("zomato.csv");
    write_csv(&path, &Table::from_documents(&documents)).unwrap();
    path
}

#[test]
fn test_dump_csv_then_train_from_file_store() {
    let workspace = TestWorkspace::new();
    let csv = export(&workspace, 300);
    let store = Arc::new(FileDocumentStore::new(workspace.path().join("data")));

    let inserted = dump_csv(store.as_ref(), DATABASE, COLLECTION, &csv).unwrap();
    assert_eq!(inserted, 300);
    assert!(store.collection_path(DATABASE, COLLECTION).is_file());

    let table = collection_as_table(store.as_ref(), DATABASE, COLLECTION).unwrap();
    assert_eq!(table.len(), 300);
    assert!(!table.has_column("_id"));
    assert!(matches!(table.rows()[0][table.column_index("rate").unwrap()], Cell::Number(_)));

    let outcome = TrainingPipeline::new(workspace.run_config("run-1", test_settings()), store)
        .run()
        .expect("training run failed");
    assert_eq!(outcome.pusher.version(), ModelVersion::INITIAL);
}

#[test]
fn test_dump_appends_and_drop_resets() {
    let workspace = TestWorkspace::new();
    let csv = export(&workspace, 10);
    let store = FileDocumentStore::new(workspace.path().join("data"));

    dump_csv(&store, DATABASE, COLLECTION, &csv).unwrap();
    dump_csv(&store, DATABASE, COLLECTION, &csv).unwrap();
    let documents = store.find_all(DATABASE, COLLECTION).unwrap();
    assert_eq!(documents.len(), 20);
    assert_eq!(documents[19]["_id"], "19");

    drop_collection(&store, DATABASE, COLLECTION).unwrap();
    assert!(store.find_all(DATABASE, COLLECTION).unwrap().is_empty());
}

#[test]
fn test_reopened_registry_ignores_foreign_entries() {
    let workspace = TestWorkspace::new();
    let csv = export(&workspace, 300);
    let store = Arc::new(FileDocumentStore::new(workspace.path().join("data")));
    dump_csv(store.as_ref(), DATABASE, COLLECTION, &csv).unwrap();

    TrainingPipeline::new(workspace.run_config("run-1", test_settings()), store)
        .run()
        .expect("training run failed");

    let root = workspace.registry_root();
    fs::create_dir_all(root.join("latest")).unwrap();
    fs::create_dir_all(root.join(".staging-1")).unwrap();
    fs::write(root.join("README"), "models").unwrap();

    let registry = ModelRegistry::open(&root).unwrap();
    assert_eq!(registry.versions(), vec![ModelVersion::INITIAL]);
    assert_eq!(registry.next_version().unwrap(), ModelVersion::new(1));
    assert_eq!(registry.latest_dir(), Some(root.join("0")));
    registry.verify(ModelVersion::INITIAL).unwrap();
}
