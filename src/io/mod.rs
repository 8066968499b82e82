//! Backing-file loaders
//!
//! Study metadata and feature tables live in fixed relative locations
//! under the base storage directory: CSV for condition assignments,
//! exclusion lists, questionnaires and long-format feature tables,
//! Parquet for the phase-keyed ensemble store. All loaders read once
//! and return immutable values; parse failures propagate unchanged
//! from the underlying readers.

mod tables;

pub use tables::{
    multi_xs, multi_xs_present, project_columns, semi_join_index, string_column,
};

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// One row of the subject condition assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCondition {
    /// Subject identifier
    pub subject: String,
    /// Condition label the subject was assigned to
    pub condition: String,
}

/// Load the per-subject condition assignment (`condition_list.csv`).
///
/// # Errors
///
/// Propagates reader errors (missing file, malformed rows) and fails
/// on an empty assignment.
pub fn load_subject_condition_list(path: &Path) -> Result<Vec<SubjectCondition>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut assignments = Vec::new();
    for record in reader.deserialize() {
        assignments.push(record?);
    }
    if assignments.is_empty() {
        return Err(Error::Schema(format!(
            "condition list {} holds no subjects",
            path.display()
        )));
    }
    Ok(assignments)
}

#[derive(Debug, Deserialize)]
struct ExcludedSubjectRecord {
    subject: String,
}

/// Load the optional exclusion list (`excluded_subjects.csv`), sorted
/// by subject id. The caller decides how to treat a missing file.
///
/// # Errors
///
/// Propagates reader errors.
pub fn load_excluded_subjects(path: &Path) -> Result<BTreeSet<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut excluded = BTreeSet::new();
    for record in reader.deserialize() {
        let record: ExcludedSubjectRecord = record?;
        excluded.insert(record.subject);
    }
    Ok(excluded)
}

/// Load a CSV table into an Arrow batch with per-column type
/// inference: a column whose every non-empty cell parses as a number
/// becomes Float64, everything else stays Utf8. Empty cells become
/// nulls.
///
/// # Errors
///
/// Propagates reader errors; fails on a header-only file.
pub fn load_csv_table(path: &Path) -> Result<RecordBatch> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, cell) in cells.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }
    if cells.first().map_or(true, Vec::is_empty) {
        return Err(Error::Schema(format!(
            "table {} holds no rows",
            path.display()
        )));
    }

    let mut fields = Vec::with_capacity(headers.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(headers.len());
    for (name, column) in headers.iter().zip(cells) {
        if is_numeric_column(&column) {
            let values: Vec<Option<f64>> = column
                .iter()
                .map(|cell| {
                    let cell = cell.trim();
                    if cell.is_empty() {
                        None
                    } else {
                        cell.parse::<f64>().ok()
                    }
                })
                .collect();
            fields.push(Field::new(name, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(values)));
        } else {
            let values: Vec<Option<String>> = column
                .into_iter()
                .map(|cell| if cell.is_empty() { None } else { Some(cell) })
                .collect();
            fields.push(Field::new(name, DataType::Utf8, true));
            arrays.push(Arc::new(StringArray::from(values)));
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn is_numeric_column(column: &[String]) -> bool {
    let mut any_value = false;
    for cell in column {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        any_value = true;
        if cell.parse::<f64>().is_err() {
            return false;
        }
    }
    any_value
}

/// Load a Parquet feature store into one Arrow batch.
///
/// # Errors
///
/// Propagates reader errors; fails on an empty store.
pub fn load_parquet_table(path: &Path) -> Result<RecordBatch> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path)
        .map_err(|e| Error::Storage(format!("failed to open table {}: {e}", path.display())))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    if batches.is_empty() {
        return Err(Error::Schema(format!(
            "table {} holds no rows",
            path.display()
        )));
    }
    let schema = batches[0].schema();
    Ok(concat_batches(&schema, &batches)?)
}

/// Value→label codebook for recoding questionnaire columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    variables: HashMap<String, HashMap<String, String>>,
}

impl Codebook {
    /// Whether the codebook recodes the given variable.
    #[must_use]
    pub fn contains(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    /// Label for a raw value of a variable, if mapped.
    #[must_use]
    pub fn label(&self, variable: &str, value: &str) -> Option<&str> {
        self.variables
            .get(variable)
            .and_then(|mapping| mapping.get(value))
            .map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct CodebookRecord {
    variable: String,
    value: String,
    label: String,
}

/// Load the questionnaire codebook (`questionnaire/codebook.csv`,
/// columns {variable, value, label}).
///
/// # Errors
///
/// Propagates reader errors.
pub fn load_codebook(path: &Path) -> Result<Codebook> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut variables: HashMap<String, HashMap<String, String>> = HashMap::new();
    for record in reader.deserialize() {
        let record: CodebookRecord = record?;
        variables
            .entry(record.variable)
            .or_default()
            .insert(record.value, record.label);
    }
    Ok(Codebook { variables })
}

/// Recode every codebook-covered column of `batch` to its labels.
/// Unmapped values keep their original rendering; covered columns
/// become Utf8.
///
/// # Errors
///
/// Propagates Arrow failures when rebuilding the batch.
pub fn apply_codebook(batch: &RecordBatch, codebook: &Codebook) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for (idx, field) in schema.fields().iter().enumerate() {
        if !codebook.contains(field.name()) {
            fields.push(field.as_ref().clone());
            arrays.push(Arc::clone(batch.column(idx)));
            continue;
        }
        let rendered = render_column(batch.column(idx))?;
        let recoded: Vec<Option<String>> = rendered
            .into_iter()
            .map(|value| {
                value.map(|value| {
                    codebook
                        .label(field.name(), &value)
                        .map_or(value, ToString::to_string)
                })
            })
            .collect();
        fields.push(Field::new(field.name(), DataType::Utf8, true));
        arrays.push(Arc::new(StringArray::from(recoded)));
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        arrays,
    )?)
}

/// Render one column cell-wise the way the codebook keys are written:
/// integral floats without the trailing `.0`.
fn render_column(column: &ArrayRef) -> Result<Vec<Option<String>>> {
    if let Some(strings) = column.as_any().downcast_ref::<StringArray>() {
        return Ok((0..strings.len())
            .map(|row| {
                if strings.is_null(row) {
                    None
                } else {
                    Some(strings.value(row).to_string())
                }
            })
            .collect());
    }
    if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
        return Ok((0..floats.len())
            .map(|row| {
                if floats.is_null(row) {
                    None
                } else {
                    let value = floats.value(row);
                    if value.fract() == 0.0 {
                        Some(format!("{value:.0}"))
                    } else {
                        Some(value.to_string())
                    }
                }
            })
            .collect());
    }
    Err(Error::Schema(format!(
        "cannot recode column of type {:?}",
        column.data_type()
    )))
}
