//! Persistence layer for the rating registry
//!
//! This crate provides everything the pipeline reads from or writes to disk:
//! - The `DocumentStore` trait the raw restaurant records come from, with a
//!   JSON-lines file implementation and an in-memory one
//! - CSV, JSON and YAML I/O for tables, fitted objects and reports
//! - The directory-backed `ModelRegistry` that versions promoted bundles
//!
//! # Example
//!
//! ```rust,no_run
//! use rating_registry_store::{ModelRegistry, StoreResult};
//! use rating_registry_core::ArtifactKind;
//!
//! # fn example() -> StoreResult<()> {
//! let registry = ModelRegistry::open("saved_models")?;
//! match registry.latest_version() {
//!     Some(version) => println!("serving version {}", version),
//!     None => println!("no model promoted yet"),
//! }
//! let next_model = registry.next_path(ArtifactKind::Model)?;
//! # let _ = next_model;
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use rating_registry_core;

// Public modules
pub mod document;
pub mod error;
pub mod io;
pub mod registry;

// Re-exports for convenience
pub use document::{
    collection_as_table, drop_collection, dump_csv, Document, DocumentStore, FileDocumentStore,
    MemoryDocumentStore, ID_FIELD,
};
pub use error::{StoreError, StoreResult};
pub use io::{load_array, load_object, read_csv, save_array, save_object, write_csv, write_yaml};
pub use registry::{bundle_path, BundleFiles, ModelRegistry};

/// Store layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
