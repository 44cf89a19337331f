//! File I/O for tables, fitted objects, arrays and reports
//!
//! Tables are stored as CSV, fitted objects and arrays as JSON, and
//! validation reports as YAML. Every writer creates missing parent
//! directories; every reader fails with [`StoreError::NotFound`] when the
//! file is absent.

use ndarray::Array2;
use rating_registry_core::{Cell, Table};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Create the parent directory of `path` if needed
pub(crate) fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    Ok(())
}

fn open_existing(path: &Path) -> StoreResult<File> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    File::open(path).map_err(|e| StoreError::io(path, e))
}

fn create(path: &Path) -> StoreResult<BufWriter<File>> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    Ok(BufWriter::new(file))
}

/// Read a CSV file with a header row into a table
pub fn read_csv(path: &Path) -> StoreResult<Table> {
    let file = open_existing(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::parse).collect())?;
    }

    debug!(path = %path.display(), rows = table.len(), "Read CSV");
    Ok(table)
}

/// Write a table as CSV with a header row; missing cells are empty fields
pub fn write_csv(path: &Path, table: &Table) -> StoreResult<()> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))?;

    debug!(path = %path.display(), rows = table.len(), "Wrote CSV");
    Ok(())
}

/// Serialize a fitted object as JSON
pub fn save_object<T: Serialize>(path: &Path, object: &T) -> StoreResult<()> {
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, object)?;
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    debug!(path = %path.display(), "Saved object");
    Ok(())
}

/// Deserialize a fitted object written by [`save_object`]
pub fn load_object<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let file = open_existing(path)?;
    let object = serde_json::from_reader(BufReader::new(file))?;
    debug!(path = %path.display(), "Loaded object");
    Ok(object)
}

/// Persist a two-dimensional array
pub fn save_array(path: &Path, array: &Array2<f64>) -> StoreResult<()> {
    save_object(path, array)
}

/// Load an array written by [`save_array`]
pub fn load_array(path: &Path) -> StoreResult<Array2<f64>> {
    load_object(path)
}

/// Write a report as YAML
pub fn write_yaml<T: Serialize>(path: &Path, report: &T) -> StoreResult<()> {
    let mut writer = create(path)?;
    serde_yaml::to_writer(&mut writer, report)?;
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_csv_keeps_commas_and_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/data.csv");
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(
            &path,
            "rate,cuisines,votes\n4.1,\"North Indian, Chinese\",775\nNA,Cafe,\n",
        )
        .unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.columns(), ["rate", "cuisines", "votes"]);
        assert_eq!(table.rows()[0][1], Cell::Text("North Indian, Chinese".into()));
        assert_eq!(table.rows()[1][0], Cell::Missing);
        assert_eq!(table.rows()[1][2], Cell::Missing);

        let copy = dir.path().join("out/copy.csv");
        write_csv(&copy, &table).unwrap();
        assert_eq!(read_csv(&copy).unwrap(), table);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.is_not_found());

        let err = load_object::<Vec<u32>>(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_object_and_array_persistence() {
        let dir = TempDir::new().unwrap();

        let mut object = BTreeMap::new();
        object.insert("Yes".to_string(), 1usize);
        let object_path = dir.path().join("encoder/encoder.json");
        save_object(&object_path, &object).unwrap();
        let loaded: BTreeMap<String, usize> = load_object(&object_path).unwrap();
        assert_eq!(loaded, object);

        let arr = array![[1.0, 0.0, 4.1], [0.0, 1.0, 3.7]];
        let array_path = dir.path().join("train.json");
        save_array(&array_path, &arr).unwrap();
        assert_eq!(load_array(&array_path).unwrap(), arr);
    }

    #[test]
    fn test_write_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report/report.yaml");
        let mut report = BTreeMap::new();
        report.insert("missing_columns", vec!["rate"]);
        write_yaml(&path, &report).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("missing_columns"));
        assert!(text.contains("rate"));
    }
}
