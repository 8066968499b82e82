//! Dataset abstractions over the study's base storage location
//!
//! Two dataset values share one index/granularity/slicing core:
//! [`RawDataset`] addresses per-subject raw recording folders,
//! [`ProcessedDataset`] addresses the pre-computed long-format feature
//! stores. Both are values describing *which* rows are addressable —
//! accessors load on demand and never mutate the dataset (the one
//! exception is the export-path accessor, which creates an output
//! directory).

mod processed;
mod raw;

pub use processed::{
    ProcessedDataset, ProcessedDatasetBuilder, ENSEMBLE_TABLE, FEATURE_TABLE, SALIVA_SAMPLE_TIMES,
};
pub use raw::{EcgData, ExportPaths, RawDataset, RawDatasetBuilder, PHASES, SAMPLING_RATE_HZ};

use crate::index::DatasetIndex;
use crate::{io, Result};
use arrow::record_batch::RecordBatch;
use std::path::Path;

/// Restrict a per-subject backing table to the subjects and conditions
/// of the current index, in index order (ordered multi-level
/// selection: subjects first, then conditions).
pub(crate) fn select_subjects_conditions(
    batch: &RecordBatch,
    index: &DatasetIndex,
) -> Result<RecordBatch> {
    let batch = io::multi_xs(batch, &index.subjects(), "subject")?;
    io::multi_xs(&batch, &index.conditions(), "condition")
}

/// Apply the subject exclusion filter to a freshly built index.
///
/// A missing exclusion file is soft: a warning is surfaced and the
/// index stays unfiltered.
pub(crate) fn apply_exclusion(index: DatasetIndex, base_path: &Path) -> Result<DatasetIndex> {
    let path = base_path.join("excluded_subjects.csv");
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "file containing subject ids to be excluded not found, loading data of all subjects"
        );
        return Ok(index);
    }
    let excluded = io::load_excluded_subjects(&path)?;
    Ok(index.without_subjects(&excluded))
}
