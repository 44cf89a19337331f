//! Data validation stage
//!
//! Checks the train and test splits for required columns and missing
//! values, and compares them against a base dataset when one is available.
//! Drift findings are reported, never enforced; only absent required
//! columns fail the stage.

use rating_registry_core::{DataValidationArtifact, Table};
use rating_registry_store::{read_csv, write_yaml};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

use crate::config::DataValidationConfig;
use crate::encoding::{numeric_value, MISSING_CATEGORY};
use crate::error::{PipelineError, PipelineResult};

/// A finding attached to a dataset or column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIssue {
    /// Dataset or `dataset.column` the finding is about
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ReportIssue {
    fn new(field: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: Some(code.to_string()),
        }
    }
}

/// Drift of one column against the base dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum ColumnDrift {
    KolmogorovSmirnov {
        statistic: f64,
        p_value: f64,
        same_distribution: bool,
    },
    /// Share of non-missing values whose category the base never had
    UnseenCategories { fraction: f64 },
}

/// Findings for one split
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub rows: usize,
    pub missing_fractions: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_missing_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub drift: BTreeMap<String, ColumnDrift>,
}

/// Report written by the validation stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False when a required column is absent
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReportIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReportIssue>,
    pub datasets: BTreeMap<String, DatasetReport>,
}

/// Two-sample Kolmogorov-Smirnov statistic: largest gap between the
/// empirical CDFs, with tied values stepped together
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d_max = 0.0f64;
    while i < a.len() && j < b.len() {
        let v = a[i].min(b[j]);
        while i < a.len() && a[i] <= v {
            i += 1;
        }
        while j < b.len() && b[j] <= v {
            j += 1;
        }
        d_max = d_max.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    d_max
}

/// Asymptotic p-value of the Kolmogorov distribution
fn ks_p_value(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut p = 0.0;
    for k in 1..=100 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let term = sign * (-2.0 * f64::from(k).powi(2) * lambda.powi(2)).exp();
        p += term;
        if term.abs() < 1e-10 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Statistic and p-value of the two-sample KS test
pub fn ks_test(a: &[f64], b: &[f64]) -> (f64, f64) {
    let statistic = ks_statistic(a, b);
    if a.is_empty() || b.is_empty() {
        return (statistic, 1.0);
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let n_eff = n1 * n2 / (n1 + n2);
    (statistic, ks_p_value(statistic * n_eff.sqrt()))
}

fn numeric_column(table: &Table, column: &str) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for cell in table.column(column).ok()? {
        match numeric_value(column, cell) {
            Ok(Some(v)) => values.push(v),
            Ok(None) => {}
            Err(_) => return None,
        }
    }
    Some(values)
}

fn categories(table: &Table, column: &str) -> Vec<String> {
    table
        .column(column)
        .map(|cells| cells.filter_map(|c| c.as_category()).collect())
        .unwrap_or_default()
}

/// Data validation stage
pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }

    fn check_dataset(
        &self,
        name: &str,
        table: &Table,
        base: Option<&Table>,
        report: &mut ValidationReport,
    ) -> Vec<String> {
        let schema = &self.config.schema;
        let settings = &self.config.settings;
        let mut dataset = DatasetReport {
            rows: table.len(),
            ..DatasetReport::default()
        };

        let absent: Vec<String> = schema
            .required_columns()
            .into_iter()
            .filter(|c| !table.has_column(c))
            .map(str::to_string)
            .collect();
        if !absent.is_empty() {
            report.errors.push(ReportIssue::new(
                name,
                format!("required columns absent: {}", absent.join(", ")),
                "missing_columns",
            ));
        }

        for column in table.columns() {
            let fraction = table.missing_fraction(column).unwrap_or(0.0);
            if fraction > settings.missing_threshold {
                dataset.high_missing_columns.push(column.clone());
                report.warnings.push(ReportIssue::new(
                    format!("{}.{}", name, column),
                    format!(
                        "{:.1}% missing, above threshold {:.1}%",
                        fraction * 100.0,
                        settings.missing_threshold * 100.0
                    ),
                    "high_missing",
                ));
            }
            dataset.missing_fractions.insert(column.clone(), fraction);
        }

        if let Some(base) = base {
            for column in table.columns().iter().filter(|c| base.has_column(c)) {
                if let Some(drift) = self.column_drift(column, base, table) {
                    if let ColumnDrift::KolmogorovSmirnov {
                        p_value,
                        same_distribution: false,
                        ..
                    } = &drift
                    {
                        report.warnings.push(ReportIssue::new(
                            format!("{}.{}", name, column),
                            format!("distribution differs from base (p = {:.4})", p_value),
                            "drift",
                        ));
                    }
                    dataset.drift.insert(column.clone(), drift);
                }
            }
        }

        debug!(
            dataset = name,
            rows = dataset.rows,
            high_missing = dataset.high_missing_columns.len(),
            drift_checks = dataset.drift.len(),
            "Checked dataset"
        );
        report.datasets.insert(name.to_string(), dataset);
        absent
    }

    fn column_drift(&self, column: &str, base: &Table, current: &Table) -> Option<ColumnDrift> {
        if self.config.schema.is_categorical(column) {
            let known: BTreeSet<String> = categories(base, column).into_iter().collect();
            let seen = categories(current, column);
            if seen.is_empty() {
                return None;
            }
            let unseen = seen
                .iter()
                .filter(|c| c.as_str() != MISSING_CATEGORY && !known.contains(*c))
                .count();
            return Some(ColumnDrift::UnseenCategories {
                fraction: unseen as f64 / seen.len() as f64,
            });
        }

        let base_values = numeric_column(base, column)?;
        let current_values = numeric_column(current, column)?;
        if base_values.is_empty() || current_values.is_empty() {
            return None;
        }
        let (statistic, p_value) = ks_test(&base_values, &current_values);
        Some(ColumnDrift::KolmogorovSmirnov {
            statistic,
            p_value,
            same_distribution: p_value > self.config.settings.p_value_threshold,
        })
    }

    fn load_base(&self) -> Option<Table> {
        let path = self.config.settings.base_file_path.as_ref()?;
        if !path.exists() {
            info!(path = %path.display(), "Base dataset not found, skipping drift checks");
            return None;
        }
        match read_csv(path) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read base dataset");
                None
            }
        }
    }

    /// Validate both splits and write the YAML report
    ///
    /// # Errors
    /// `MissingColumns` when a split lacks a required column; the report is
    /// written first so the finding is on disk.
    #[instrument(skip(self, train_file_path, test_file_path), fields(
        train = %train_file_path.display(),
        test = %test_file_path.display()
    ))]
    pub fn initiate_data_validation(
        &self,
        train_file_path: &std::path::Path,
        test_file_path: &std::path::Path,
    ) -> PipelineResult<DataValidationArtifact> {
        let train = read_csv(train_file_path)?;
        let test = read_csv(test_file_path)?;
        let base = self.load_base();

        let mut report = ValidationReport::default();
        let mut failure = None;
        for (name, table) in [("train", &train), ("test", &test)] {
            let absent = self.check_dataset(name, table, base.as_ref(), &mut report);
            if failure.is_none() && !absent.is_empty() {
                failure = Some(PipelineError::MissingColumns {
                    dataset: name.to_string(),
                    columns: absent,
                });
            }
        }
        report.valid = report.errors.is_empty();

        write_yaml(&self.config.report_file_path, &report)?;
        info!(
            valid = report.valid,
            warnings = report.warnings.len(),
            path = %self.config.report_file_path.display(),
            "Wrote validation report"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(DataValidationArtifact::new(&self.config.report_file_path)),
        }
    }
}
