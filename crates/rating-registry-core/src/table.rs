//! In-memory tabular data
//!
//! A `Table` is the unit every stage reads and writes: CSV files, document
//! collections and prediction outputs all pass through it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{RegistryError, Result};

/// Tokens read as missing values
const MISSING_TOKENS: [&str; 6] = ["", "na", "NA", "NaN", "nan", "null"];

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Interpret a raw text field the way CSV input is read
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS.contains(&trimmed) {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    /// Convert a JSON document value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) => Cell::parse(s),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Convert back to a JSON document value
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Missing => Value::Null,
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric value, if this cell holds one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Category label used by the encoders; `None` for missing cells
    pub fn as_category(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from documents; columns appear in first-seen order
    pub fn from_documents(documents: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for doc in documents {
            for key in doc.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = documents
            .iter()
            .map(|doc| {
                columns
                    .iter()
                    .map(|c| doc.get(c).map(Cell::from_json).unwrap_or(Cell::Missing))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Convert every row to a document, skipping missing cells
    pub fn to_documents(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .filter(|(_, cell)| !cell.is_missing())
                    .map(|(name, cell)| (name.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Position of a column in the header
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RegistryError::ColumnNotFound(name.to_string()))
    }

    /// Append a row; it must have one cell per column
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(RegistryError::ValidationError(format!(
                "Row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Iterate over the cells of one column
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Fraction of missing cells in a column (0 for an empty table)
    pub fn missing_fraction(&self, name: &str) -> Result<f64> {
        if self.rows.is_empty() {
            self.column_index(name)?;
            return Ok(0.0);
        }
        let missing = self.column(name)?.filter(|c| c.is_missing()).count();
        Ok(missing as f64 / self.rows.len() as f64)
    }

    /// Non-missing numeric values of a column
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.column(name)?.filter_map(Cell::as_f64).collect())
    }

    /// True when every non-missing cell of the column is a number
    pub fn is_numeric_column(&self, name: &str) -> Result<bool> {
        Ok(self
            .column(name)?
            .all(|c| matches!(c, Cell::Missing | Cell::Number(_))))
    }

    /// Remove the named columns that are present; unknown names are ignored
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !names.iter().any(|n| n.as_ref() == c.as_str()))
            .map(|(i, _)| i)
            .collect();

        Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// New table holding the given rows in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Append a column at the end
    pub fn add_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if cells.len() != self.rows.len() {
            return Err(RegistryError::ValidationError(format!(
                "Column {} has {} cells but table has {} rows",
                name,
                cells.len(),
                self.rows.len()
            )));
        }
        if self.has_column(&name) {
            return Err(RegistryError::ValidationError(format!(
                "Column {} already exists",
                name
            )));
        }
        self.columns.push(name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("4.1"), Cell::Number(4.1));
        assert_eq!(Cell::parse("na"), Cell::Missing);
        assert_eq!(Cell::parse(" "), Cell::Missing);
        assert_eq!(Cell::parse("Yes"), Cell::Text("Yes".to_string()));
        assert_eq!(Cell::parse("inf"), Cell::Text("inf".to_string()));
    }

    #[test]
    fn test_from_documents_unions_keys_in_order() {
        let table = Table::from_documents(&[
            doc(json!({"rate": 4.1, "location": "BTM"})),
            doc(json!({"rate": 3.9, "votes": 12})),
        ]);

        assert_eq!(table.columns(), ["rate", "location", "votes"]);
        assert_eq!(table.rows()[1][1], Cell::Missing);
        assert_eq!(table.rows()[0][2], Cell::Missing);
    }

    #[test]
    fn test_drop_and_missing_fraction() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![Cell::Number(1.0), Cell::Missing]).unwrap();
        table.push_row(vec![Cell::Number(2.0), Cell::Text("x".into())]).unwrap();

        assert_eq!(table.missing_fraction("b").unwrap(), 0.5);
        assert!(table.is_numeric_column("a").unwrap());
        assert!(!table.is_numeric_column("b").unwrap());

        let dropped = table.drop_columns(&["b", "not_there"]);
        assert_eq!(dropped.columns(), ["a"]);
        assert_eq!(dropped.numeric_values("a").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut table = Table::new(vec!["a".into()]);
        assert!(table.push_row(vec![]).is_err());
    }

    #[test]
    fn test_add_column() {
        let mut table = Table::new(vec!["a".into()]);
        table.push_row(vec![Cell::Number(1.0)]).unwrap();
        table.add_column("prediction", vec![Cell::Number(3.5)]).unwrap();
        assert_eq!(table.columns(), ["a", "prediction"]);
        assert!(table.add_column("a", vec![Cell::Missing]).is_err());
    }

    #[test]
    fn test_documents_skip_missing_cells() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![Cell::Number(1.0), Cell::Missing]).unwrap();
        let docs = table.to_documents();
        assert_eq!(docs[0].len(), 1);
        assert_eq!(docs[0]["a"], json!(1.0));
    }
}
