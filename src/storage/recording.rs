//! Per-file recording parsers
//!
//! Two container formats exist on storage: Parquet (the regular binary
//! container, sampling rate and start time in the file's key/value
//! metadata) and delimited CSV (a fallback format from recording
//! mistakes during the study; sampling rate in a leading comment line).
//! Both parse into one homogeneous Arrow table plus its sampling rate.

use crate::{Error, Result};
use arrow::array::{Array, Float64Array};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Parquet metadata key holding the sampling rate.
const META_SAMPLING_RATE: &str = "sampling_rate_hz";
/// Parquet metadata key holding the optional recording start time (RFC 3339).
const META_START_TIME: &str = "start_time";

/// Sample-counter column of current-firmware recordings.
const COUNTER_COLUMN: &str = "counter";
/// Sample-counter column written by legacy firmware.
const LEGACY_COUNTER_COLUMN: &str = "n_samples";

/// Scalar metadata of one recording file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMeta {
    /// Sampling rate of the recording in Hz
    pub sampling_rate_hz: f64,
    /// Wall-clock start of the recording, if the container carries one
    pub start_time: Option<DateTime<Utc>>,
}

/// Parse one recording file, dispatching on the file extension.
///
/// The returned table contains the channel columns only; the sample
/// counter is validated (gaps are benign firmware artifacts, logged at
/// debug) and dropped.
///
/// # Errors
///
/// Returns an error for unknown extensions, missing sampling-rate
/// metadata, or any parser failure from the underlying readers.
pub fn read_recording(path: &Path) -> Result<(RecordBatch, RecordingMeta)> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "parquet" => read_parquet_recording(path),
        "csv" => read_csv_recording(path),
        other => Err(Error::Storage(format!(
            "unsupported recording container: .{other} ({})",
            path.display()
        ))),
    }
}

fn read_parquet_recording(path: &Path) -> Result<(RecordBatch, RecordingMeta)> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path)
        .map_err(|e| Error::Storage(format!("failed to open recording {}: {e}", path.display())))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let mut sampling_rate = None;
    let mut start_time = None;
    if let Some(entries) = builder.metadata().file_metadata().key_value_metadata() {
        for entry in entries {
            match (entry.key.as_str(), entry.value.as_deref()) {
                (META_SAMPLING_RATE, Some(value)) => {
                    sampling_rate = value.parse::<f64>().ok();
                }
                (META_START_TIME, Some(value)) => {
                    start_time = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|ts| ts.with_timezone(&Utc));
                }
                _ => {}
            }
        }
    }
    let sampling_rate_hz = sampling_rate.ok_or_else(|| {
        Error::Schema(format!(
            "recording {} carries no {META_SAMPLING_RATE} metadata",
            path.display()
        ))
    })?;

    let reader = builder.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    if batches.is_empty() {
        return Err(Error::Storage(format!(
            "recording {} contains no row groups",
            path.display()
        )));
    }
    let schema = batches[0].schema();
    let batch = concat_batches(&schema, &batches)?;
    let batch = strip_counter(&batch, path)?;

    Ok((
        batch,
        RecordingMeta {
            sampling_rate_hz,
            start_time,
        },
    ))
}

/// CSV layout: a leading `# sampling_rate_hz: <f64>` comment line,
/// followed by a header row and one sample per line. All channels are
/// numeric.
fn read_csv_recording(path: &Path) -> Result<(RecordBatch, RecordingMeta)> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.splitn(2, '\n');
    let first = lines.next().unwrap_or("").trim();
    let body = lines.next().unwrap_or("");

    let sampling_rate_hz = first
        .strip_prefix('#')
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix("sampling_rate_hz:"))
        .and_then(|value| value.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            Error::Schema(format!(
                "recording {} has no leading '# sampling_rate_hz:' line",
                path.display()
            ))
        })?;

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            let value = cell.trim().parse::<f64>().map_err(|_| {
                Error::Schema(format!(
                    "non-numeric sample {cell:?} in recording {}",
                    path.display()
                ))
            })?;
            column.push(value);
        }
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name, DataType::Float64, false))
        .collect();
    let arrays = columns
        .into_iter()
        .map(|column| Arc::new(Float64Array::from(column)) as arrow::array::ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    let batch = strip_counter(&batch, path)?;

    Ok((
        batch,
        RecordingMeta {
            sampling_rate_hz,
            start_time: None,
        },
    ))
}

/// Validate the sample counter and drop it from the table.
///
/// Counter gaps and the legacy counter column name are known-benign
/// firmware artifacts; both are demoted to debug logs since the last
/// second of every recording is trimmed anyway.
fn strip_counter(batch: &RecordBatch, path: &Path) -> Result<RecordBatch> {
    let schema = batch.schema();
    let counter_idx = schema.index_of(COUNTER_COLUMN).ok().or_else(|| {
        let idx = schema.index_of(LEGACY_COUNTER_COLUMN).ok();
        if idx.is_some() {
            tracing::debug!(
                path = %path.display(),
                "legacy counter column {LEGACY_COUNTER_COLUMN:?} found"
            );
        }
        idx
    });
    let Some(counter_idx) = counter_idx else {
        return Ok(batch.clone());
    };

    let counter = cast(batch.column(counter_idx), &DataType::Float64)?;
    let counter = counter
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Schema("counter column is not numeric".to_string()))?;
    let gaps = counter
        .values()
        .windows(2)
        .filter(|pair| (pair[1] - pair[0] - 1.0).abs() > f64::EPSILON)
        .count();
    if gaps > 0 {
        tracing::debug!(path = %path.display(), gaps, "sample counter gaps in recording");
    }

    let keep: Vec<usize> = (0..batch.num_columns())
        .filter(|idx| *idx != counter_idx)
        .collect();
    Ok(batch.project(&keep)?)
}
