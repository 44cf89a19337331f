//! Categorical encoders and feature assembly
//!
//! Two fitted objects travel with every model:
//! - [`OrdinalEncoder`] (the "encoder" artifact): one [`LabelEncoder`] per
//!   ordinal column, mapping categories to their index in sorted order.
//! - [`OneHotTransformer`] (the "transformer" artifact): one-hot categories
//!   of the nominal columns plus the ordered list of numeric passthrough
//!   columns recorded at fit time.
//!
//! [`prepare_features`] applies both to a raw table. Training, evaluation
//! and prediction all go through it, so the feature layout a model sees is
//! always the one recorded when its encoders were fitted.

use ndarray::{Array1, Array2};
use rating_registry_core::{Cell, FeatureSchema, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PipelineError, PipelineResult};

/// Category used for missing categorical cells
pub const MISSING_CATEGORY: &str = "<missing>";

fn category(cell: &Cell) -> String {
    cell.as_category()
        .unwrap_or_else(|| MISSING_CATEGORY.to_string())
}

/// Read a numeric cell; thousands separators such as `1,200` are accepted
pub fn numeric_value(column: &str, cell: &Cell) -> PipelineResult<Option<f64>> {
    match cell {
        Cell::Missing => Ok(None),
        Cell::Number(n) => Ok(Some(*n)),
        Cell::Text(s) => s
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| PipelineError::NonNumeric {
                column: column.to_string(),
                value: s.clone(),
            }),
    }
}

fn require_columns(table: &Table, columns: &[String], dataset: &str) -> PipelineResult<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns {
            dataset: dataset.to_string(),
            columns: missing,
        })
    }
}

/// Maps the categories of one column to `0..n` in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I>(values: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let classes: BTreeSet<String> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Label encoders for the ordinal columns, one per column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl OrdinalEncoder {
    /// Fit one label encoder per column
    pub fn fit(table: &Table, columns: &[String]) -> PipelineResult<Self> {
        require_columns(table, columns, "encoder fit")?;
        let mut encoders = BTreeMap::new();
        for column in columns {
            let values = table.column(column)?.map(category);
            encoders.insert(column.clone(), LabelEncoder::fit(values));
        }
        Ok(Self { encoders })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn encoder(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Replace every ordinal cell with its numeric code
    ///
    /// # Errors
    /// `UnknownCategory` for a value not seen at fit time.
    pub fn encode_table(&self, table: &Table) -> PipelineResult<Table> {
        let names: Vec<String> = self.encoders.keys().cloned().collect();
        require_columns(table, &names, "encoder input")?;

        let positions: Vec<(usize, &String, &LabelEncoder)> = self
            .encoders
            .iter()
            .map(|(name, enc)| -> PipelineResult<_> {
                Ok((table.column_index(name)?, name, enc))
            })
            .collect::<PipelineResult<_>>()?;

        let mut encoded = Table::new(table.columns().to_vec());
        for row in table.rows() {
            let mut row = row.clone();
            for &(idx, name, enc) in &positions {
                let value = category(&row[idx]);
                let code = enc
                    .transform(&value)
                    .ok_or_else(|| PipelineError::UnknownCategory {
                        column: name.clone(),
                        value: value.clone(),
                    })?;
                row[idx] = Cell::Number(code as f64);
            }
            encoded.push_row(row)?;
        }
        Ok(encoded)
    }
}

/// Categories of one one-hot encoded column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NominalColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// One-hot encoder for nominal columns plus the passthrough layout
///
/// Output features are the passthrough columns in recorded order followed
/// by one indicator per `(column, category)`. Categories not seen at fit
/// time produce all-zero indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotTransformer {
    nominal: Vec<NominalColumn>,
    passthrough: Vec<String>,
    /// Median of each passthrough column at fit time, used for missing cells
    fill_values: Vec<f64>,
}

impl OneHotTransformer {
    /// Fit on a table whose ordinal columns are already encoded and whose
    /// target has been removed
    pub fn fit(table: &Table, nominal: &[String]) -> PipelineResult<Self> {
        require_columns(table, nominal, "transformer fit")?;

        let mut columns = Vec::with_capacity(nominal.len());
        for name in nominal {
            let categories: BTreeSet<String> = table.column(name)?.map(category).collect();
            columns.push(NominalColumn {
                name: name.clone(),
                categories: categories.into_iter().collect(),
            });
        }

        let passthrough: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !nominal.contains(*c))
            .cloned()
            .collect();

        let mut fill_values = Vec::with_capacity(passthrough.len());
        for name in &passthrough {
            let mut values = Vec::new();
            for cell in table.column(name)? {
                if let Some(v) = numeric_value(name, cell)? {
                    values.push(v);
                }
            }
            fill_values.push(median(&mut values));
        }

        Ok(Self {
            nominal: columns,
            passthrough,
            fill_values,
        })
    }

    pub fn n_features(&self) -> usize {
        self.passthrough.len()
            + self
                .nominal
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Build the feature matrix; columns not known at fit time are ignored
    pub fn transform(&self, table: &Table) -> PipelineResult<Array2<f64>> {
        let needed: Vec<String> = self
            .passthrough
            .iter()
            .chain(self.nominal.iter().map(|c| &c.name))
            .cloned()
            .collect();
        require_columns(table, &needed, "transformer input")?;

        let pass_idx: Vec<usize> = self
            .passthrough
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<_, _>>()?;
        let nominal_idx: Vec<usize> = self
            .nominal
            .iter()
            .map(|c| table.column_index(&c.name))
            .collect::<Result<_, _>>()?;

        let mut matrix = Array2::<f64>::zeros((table.len(), self.n_features()));
        for (r, row) in table.rows().iter().enumerate() {
            for (j, &idx) in pass_idx.iter().enumerate() {
                let name = &self.passthrough[j];
                matrix[[r, j]] = numeric_value(name, &row[idx])?.unwrap_or(self.fill_values[j]);
            }

            let mut offset = self.passthrough.len();
            for (col, &idx) in self.nominal.iter().zip(&nominal_idx) {
                let value = category(&row[idx]);
                if let Ok(pos) = col.categories.binary_search(&value) {
                    matrix[[r, offset + pos]] = 1.0;
                }
                offset += col.categories.len();
            }
        }
        Ok(matrix)
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Keep only the rows whose target is present
pub fn rows_with_target(table: &Table, target: &str) -> PipelineResult<Table> {
    let idx = table.column_index(target)?;
    let keep: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| !row[idx].is_missing())
        .map(|(i, _)| i)
        .collect();
    Ok(table.take_rows(&keep))
}

/// Numeric target vector of a table
pub fn target_values(table: &Table, target: &str) -> PipelineResult<Array1<f64>> {
    table
        .column(target)?
        .map(|cell| {
            numeric_value(target, cell)?.ok_or_else(|| PipelineError::NonNumeric {
                column: target.to_string(),
                value: MISSING_CATEGORY.to_string(),
            })
        })
        .collect()
}

/// Features (and the target, when the table has it) ready for a model
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub features: Array2<f64>,
    pub target: Option<Array1<f64>>,
}

/// Apply a fitted encoder and transformer to a raw table
pub fn prepare_features(
    table: &Table,
    encoder: &OrdinalEncoder,
    transformer: &OneHotTransformer,
    schema: &FeatureSchema,
) -> PipelineResult<PreparedData> {
    let target = if table.has_column(&schema.target_column) {
        Some(target_values(table, &schema.target_column)?)
    } else {
        None
    };
    let inputs = table.drop_columns(&[schema.target_column.as_str()]);
    let encoded = encoder.encode_table(&inputs)?;
    let features = transformer.transform(&encoded)?;
    Ok(PreparedData { features, target })
}

/// Fit both encoders on a training table
pub fn fit_encoders(
    table: &Table,
    schema: &FeatureSchema,
) -> PipelineResult<(OrdinalEncoder, OneHotTransformer)> {
    let inputs = table.drop_columns(&[schema.target_column.as_str()]);
    let encoder = OrdinalEncoder::fit(&inputs, &schema.ordinal_features)?;
    let encoded = encoder.encode_table(&inputs)?;
    let transformer = OneHotTransformer::fit(&encoded, &schema.nominal_features)?;
    Ok((encoder, transformer))
}
