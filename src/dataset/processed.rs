//! Processed dataset: pre-computed long-format feature stores
//!
//! The index is read directly from the merged heart-rate feature
//! table; phases and subphases present are exactly those that exist in
//! the feature file. Subject exclusion is applied at construction,
//! before any downstream slicing.

use crate::index::{check_access, DataCategory, DatasetIndex, IndexRow};
use crate::io;
use crate::Result;
use arrow::record_batch::RecordBatch;
use std::path::{Path, PathBuf};

/// Merged long-format heart-rate feature table, relative to the base
/// location.
pub const FEATURE_TABLE: &str = "ecg/cft_hr_features_merged.csv";

/// Phase-keyed ensemble heart-rate store, relative to the base
/// location.
pub const ENSEMBLE_TABLE: &str = "ecg/cft_hr_ensemble.parquet";

/// Saliva sampling schedule of the protocol, minutes relative to
/// stress onset.
pub const SALIVA_SAMPLE_TIMES: [i32; 7] = [-30, -1, 0, 10, 20, 30, 40];

/// Dataset over pre-computed feature tables.
#[derive(Debug, Clone)]
pub struct ProcessedDataset {
    base_path: PathBuf,
    index: DatasetIndex,
}

impl ProcessedDataset {
    /// Start building a processed dataset over `base_path`.
    pub fn builder(base_path: impl Into<PathBuf>) -> ProcessedDatasetBuilder {
        ProcessedDatasetBuilder {
            base_path: base_path.into(),
            exclude_subjects: true,
        }
    }

    /// The current index subset.
    #[must_use]
    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    /// Base storage location of the study data.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Saliva sampling schedule of the protocol.
    #[must_use]
    pub const fn sample_times(&self) -> [i32; 7] {
        SALIVA_SAMPLE_TIMES
    }

    /// Narrow the subset to the given subjects.
    #[must_use]
    pub fn with_subjects(&self, subjects: &[&str]) -> Self {
        self.narrowed(self.index.filter(|row| subjects.contains(&row.subject.as_str())))
    }

    /// Narrow the subset to the given conditions.
    #[must_use]
    pub fn with_conditions(&self, conditions: &[&str]) -> Self {
        self.narrowed(
            self.index
                .filter(|row| conditions.contains(&row.condition.as_str())),
        )
    }

    /// Narrow the subset to the given phases.
    #[must_use]
    pub fn with_phases(&self, phases: &[&str]) -> Self {
        self.narrowed(self.index.filter(|row| phases.contains(&row.phase.as_str())))
    }

    /// Narrow the subset to the given subphases.
    #[must_use]
    pub fn with_subphases(&self, subphases: &[&str]) -> Self {
        self.narrowed(self.index.filter(|row| {
            row.subphase
                .as_deref()
                .map_or(false, |subphase| subphases.contains(&subphase))
        }))
    }

    /// Heart-rate features of the current subset.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn heart_rate(&self) -> Result<RecordBatch> {
        self.slice_features(&["HR"])
    }

    /// Heart-rate-variability features of the current subset.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn hrv(&self) -> Result<RecordBatch> {
        self.slice_features(&["HRV"])
    }

    /// Combined HR and HRV features of the current subset.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn hr_hrv(&self) -> Result<RecordBatch> {
        self.slice_features(&["HR", "HRV"])
    }

    /// Time-above-global-baseline features of the current subset.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn time_above_baseline(&self) -> Result<RecordBatch> {
        self.slice_features(&["Time_BL_Glo"])
    }

    /// Cold-face-test parameters of the current subset.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn cft_parameter(&self) -> Result<RecordBatch> {
        self.slice_features(&["CFT"])
    }

    /// Ensemble heart rate: per-phase signal tables aligned across
    /// subjects, restricted to the phases and subjects of the current
    /// subset and concatenated into one table keyed by phase then
    /// subject.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Granularity`] on single-point or
    /// single-subphase subsets; [`crate::Error::KeyNotFound`] for a
    /// subject column missing from the store. Phases absent from the
    /// store are silently skipped.
    pub fn heart_rate_ensemble(&self) -> Result<RecordBatch> {
        check_access(DataCategory::HrEnsemble, &self.index)?;
        let store = io::load_parquet_table(&self.base_path.join(ENSEMBLE_TABLE))?;
        let store = io::multi_xs_present(&store, &self.index.phases(), "phase")?;

        let mut columns = vec!["phase".to_string()];
        if store.schema().index_of("time").is_ok() {
            columns.push("time".to_string());
        }
        columns.extend(self.index.subjects());
        io::project_columns(&store, &columns)
    }

    /// Wide questionnaire scores restricted to the current subset.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Granularity`] on phase- or subphase-pinned
    /// subsets; [`crate::Error::KeyNotFound`] for subjects missing
    /// from the backing file.
    pub fn questionnaire(&self) -> Result<RecordBatch> {
        check_access(DataCategory::Questionnaire, &self.index)?;
        let batch =
            io::load_csv_table(&self.base_path.join("questionnaire/questionnaire_data.csv"))?;
        super::select_subjects_conditions(&batch, &self.index)
    }

    /// Questionnaire scores with codebook labels applied.
    ///
    /// # Errors
    ///
    /// Same surface as [`ProcessedDataset::questionnaire`], plus
    /// codebook reader errors.
    pub fn questionnaire_recoded(&self) -> Result<RecordBatch> {
        let data = self.questionnaire()?;
        let codebook = io::load_codebook(&self.base_path.join("questionnaire/codebook.csv"))?;
        io::apply_codebook(&data, &codebook)
    }

    /// Long-format cortisol samples restricted to the current subset.
    ///
    /// # Errors
    ///
    /// Same surface as [`ProcessedDataset::questionnaire`].
    pub fn cortisol(&self) -> Result<RecordBatch> {
        self.saliva_samples("cortisol")
    }

    /// Cortisol features restricted to the current subset.
    ///
    /// # Errors
    ///
    /// Same surface as [`ProcessedDataset::questionnaire`].
    pub fn cortisol_features(&self) -> Result<RecordBatch> {
        self.saliva_features("cortisol")
    }

    /// Long-format saliva samples of one type.
    ///
    /// # Errors
    ///
    /// Same surface as [`ProcessedDataset::questionnaire`].
    pub fn saliva_samples(&self, saliva_type: &str) -> Result<RecordBatch> {
        self.load_saliva(&format!("saliva/{saliva_type}_samples.csv"))
    }

    /// Saliva features of one type.
    ///
    /// # Errors
    ///
    /// Same surface as [`ProcessedDataset::questionnaire`].
    pub fn saliva_features(&self, saliva_type: &str) -> Result<RecordBatch> {
        self.load_saliva(&format!("saliva/{saliva_type}_features.csv"))
    }

    fn load_saliva(&self, relative: &str) -> Result<RecordBatch> {
        check_access(DataCategory::Saliva, &self.index)?;
        let batch = io::load_csv_table(&self.base_path.join(relative))?;
        super::select_subjects_conditions(&batch, &self.index)
    }

    fn slice_features(&self, categories: &[&str]) -> Result<RecordBatch> {
        let data = io::load_csv_table(&self.base_path.join(FEATURE_TABLE))?;
        let categories: Vec<String> = categories.iter().map(ToString::to_string).collect();
        let data = io::multi_xs(&data, &categories, "category")?;
        io::semi_join_index(&data, &self.index)
    }

    fn narrowed(&self, index: DatasetIndex) -> Self {
        Self {
            base_path: self.base_path.clone(),
            index,
        }
    }
}

/// Builder for [`ProcessedDataset`].
#[derive(Debug)]
pub struct ProcessedDatasetBuilder {
    base_path: PathBuf,
    exclude_subjects: bool,
}

impl ProcessedDatasetBuilder {
    /// Apply the subject exclusion filter at index construction
    /// (default: on for processed datasets).
    #[must_use]
    pub const fn exclude_subjects(mut self, exclude_subjects: bool) -> Self {
        self.exclude_subjects = exclude_subjects;
        self
    }

    /// Build the dataset: read the feature table and take its
    /// distinct index rows as the addressable key space.
    ///
    /// # Errors
    ///
    /// Feature-table reader errors propagate unchanged.
    pub fn build(self) -> Result<ProcessedDataset> {
        let features = io::load_csv_table(&self.base_path.join(FEATURE_TABLE))?;
        let condition = io::string_column(&features, "condition")?;
        let subject = io::string_column(&features, "subject")?;
        let phase = io::string_column(&features, "phase")?;
        let subphase = io::string_column(&features, "subphase")?;

        let rows = (0..features.num_rows()).map(|row| IndexRow {
            condition: condition.value(row).to_string(),
            subject: subject.value(row).to_string(),
            phase: phase.value(row).to_string(),
            subphase: Some(subphase.value(row).to_string()),
        });
        let mut index = DatasetIndex::from_feature_rows(rows);
        if self.exclude_subjects {
            index = super::apply_exclusion(index, &self.base_path)?;
        }
        Ok(ProcessedDataset {
            base_path: self.base_path,
            index,
        })
    }
}
