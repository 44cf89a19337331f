//! Document store abstractions
//!
//! This module defines the `DocumentStore` trait the ingestion stage reads
//! restaurant records from, along with a file-backed implementation (one
//! JSON-lines file per collection) and an in-memory one.

use rating_registry_core::Table;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{StoreError, StoreResult};
use crate::io::{ensure_parent, read_csv};

/// A JSON document
pub type Document = Map<String, Value>;

/// Identifier field every stored document carries
pub const ID_FIELD: &str = "_id";

/// Document store trait
///
/// Implementations return collections wholesale; the pipeline never
/// queries a subset.
pub trait DocumentStore: Send + Sync {
    /// Return every document of a collection; an unknown collection is empty
    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>>;

    /// Append documents to a collection, creating it if needed
    ///
    /// Returns the number of documents inserted.
    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<usize>;
}

/// Document store keeping one JSON-lines file per collection
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Create a store rooted at `root`; directories are created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a collection
    pub fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.jsonl", collection))
    }

    fn next_id(&self, path: &Path) -> StoreResult<u64> {
        if !path.exists() {
            return Ok(0);
        }
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let lines = BufReader::new(file)
            .lines()
            .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
            .count();
        Ok(lines as u64)
    }
}

impl DocumentStore for FileDocumentStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>> {
        let path = self.collection_path(database, collection);
        if !path.exists() {
            debug!(path = %path.display(), "Collection file absent, returning no documents");
            return Ok(Vec::new());
        }

        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let mut documents = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line)? {
                Value::Object(doc) => documents.push(doc),
                other => {
                    return Err(StoreError::InvalidData(format!(
                        "{}:{}: expected a JSON object, found {}",
                        path.display(),
                        line_no + 1,
                        other
                    )))
                }
            }
        }

        debug!(count = documents.len(), "Loaded documents");
        Ok(documents)
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<usize> {
        let path = self.collection_path(database, collection);
        ensure_parent(&path)?;
        let mut next_id = self.next_id(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        let mut writer = BufWriter::new(file);

        let count = documents.len();
        for mut doc in documents {
            if !doc.contains_key(ID_FIELD) {
                doc.insert(ID_FIELD.to_string(), Value::String(next_id.to_string()));
            }
            next_id += 1;
            serde_json::to_writer(&mut writer, &doc)?;
            writer.write_all(b"\n").map_err(|e| StoreError::io(&path, e))?;
        }
        writer.flush().map_err(|e| StoreError::io(&path, e))?;

        Ok(count)
    }
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<(String, String), Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::InvalidData("document store lock poisoned".to_string()))?;
        Ok(collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<usize> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::InvalidData("document store lock poisoned".to_string()))?;
        let stored = collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();

        let count = documents.len();
        for mut doc in documents {
            if !doc.contains_key(ID_FIELD) {
                doc.insert(ID_FIELD.to_string(), Value::String(stored.len().to_string()));
            }
            stored.push(doc);
        }
        Ok(count)
    }
}

/// Read a whole collection into a table, without the document id column
#[instrument(skip(store))]
pub fn collection_as_table(
    store: &dyn DocumentStore,
    database: &str,
    collection: &str,
) -> StoreResult<Table> {
    let documents = store.find_all(database, collection)?;
    let table = Table::from_documents(&documents).drop_columns(&[ID_FIELD]);
    info!(
        rows = table.len(),
        columns = table.columns().len(),
        "Read collection as table"
    );
    Ok(table)
}

/// Load a CSV file and insert every row as a document
#[instrument(skip(store, csv_path), fields(csv = %csv_path.display()))]
pub fn dump_csv(
    store: &dyn DocumentStore,
    database: &str,
    collection: &str,
    csv_path: &Path,
) -> StoreResult<usize> {
    let table = read_csv(csv_path)?;
    let inserted = store.insert_many(database, collection, table.to_documents())?;
    info!(inserted, "Dumped CSV rows into collection");
    Ok(inserted)
}

/// Remove a collection file; used when re-seeding a store
pub fn drop_collection(
    store: &FileDocumentStore,
    database: &str,
    collection: &str,
) -> StoreResult<()> {
    let path = store.collection_path(database, collection);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
    }
    Ok(())
}
