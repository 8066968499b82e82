//! Raw dataset: per-subject recording folders plus study metadata
//!
//! The index is the cartesian product of the condition assignment with
//! the fixed MIST phase sequence. ECG access goes through the bounded
//! recording cache and is additionally memoized per instance.

use crate::cache::{self, RecordingCache, RecordingKey};
use crate::index::{check_access, DataCategory, DatasetIndex, Granularity};
use crate::io::{self, SubjectCondition};
use crate::storage::{self, RecordingSession};
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Fixed phase sequence of the MIST protocol.
pub const PHASES: [&str; 5] = ["Pre", "MIST1", "MIST2", "MIST3", "Post"];

/// Nominal sampling rate of the study's ECG recordings.
pub const SAMPLING_RATE_HZ: f64 = 256.0;

/// ECG data scoped to the current subset.
#[derive(Debug, Clone, PartialEq)]
pub enum EcgData {
    /// The subset pinned one exact phase: that phase's signal table
    SinglePhase(RecordBatch),
    /// Phase-keyed mapping over all phases of the subset
    PerPhase(RecordingSession),
}

/// Canonical output locations for downstream result writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Per-phase heart-rate results
    pub hr_result: PathBuf,
    /// Per-phase R-peak locations
    pub rpeaks_result: PathBuf,
    /// Continuous HRV results
    pub hrv_continuous: PathBuf,
}

/// Dataset over raw per-subject recordings.
#[derive(Debug)]
pub struct RawDataset {
    base_path: PathBuf,
    index: DatasetIndex,
    phases: Vec<String>,
    use_cache: bool,
    cache: Option<Arc<RecordingCache>>,
    ecg_cell: OnceLock<Arc<EcgData>>,
}

impl Clone for RawDataset {
    fn clone(&self) -> Self {
        // the ECG memo cell is per instance and starts out empty
        Self {
            base_path: self.base_path.clone(),
            index: self.index.clone(),
            phases: self.phases.clone(),
            use_cache: self.use_cache,
            cache: self.cache.clone(),
            ecg_cell: OnceLock::new(),
        }
    }
}

impl RawDataset {
    /// Start building a raw dataset over `base_path`.
    pub fn builder(base_path: impl Into<PathBuf>) -> RawDatasetBuilder {
        RawDatasetBuilder {
            base_path: base_path.into(),
            use_cache: true,
            exclude_subjects: false,
            cache: None,
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

    /// Nominal sampling rate of the raw recordings.
    #[must_use]
    pub const fn sampling_rate(&self) -> f64 {
        SAMPLING_RATE_HZ
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

    /// Raw ECG of the addressed subject, memoized per instance.
    ///
    /// Legal only when the subset denotes a single subject, optionally
    /// narrowed to phases. If the subset pins one exact phase the
    /// single-phase table is returned, otherwise the phase-keyed
    /// mapping.
    ///
    /// # Errors
    ///
    /// [`Error::Granularity`] on a broader subset; loader errors
    /// propagate.
    pub fn ecg(&self) -> Result<Arc<EcgData>> {
        if let Some(data) = self.ecg_cell.get() {
            return Ok(Arc::clone(data));
        }
        check_access(DataCategory::EcgSignal, &self.index)?;
        let subject = self.single_subject()?;
        let selected = self.index.phases();
        let session = self.load_session(&subject, &selected)?;

        let data = if Granularity::classify(&self.index) == Granularity::SinglePoint {
            let phase = &selected[0];
            let batch = session
                .phase(phase)
                .ok_or_else(|| Error::KeyNotFound {
                    level: "phase".to_string(),
                    key: phase.clone(),
                })?
                .clone();
            EcgData::SinglePhase(batch)
        } else {
            EcgData::PerPhase((*session).clone())
        };
        Ok(Arc::clone(self.ecg_cell.get_or_init(|| Arc::new(data))))
    }

    /// Wide questionnaire scores restricted to the current subset.
    ///
    /// # Errors
    ///
    /// [`Error::Granularity`] on phase- or subphase-pinned subsets;
    /// [`Error::KeyNotFound`] for subjects missing from the backing
    /// file.
    pub fn questionnaire(&self) -> Result<RecordBatch> {
        check_access(DataCategory::Questionnaire, &self.index)?;
        let batch =
            io::load_csv_table(&self.base_path.join("questionnaire/questionnaire_data.csv"))?;
        super::select_subjects_conditions(&batch, &self.index)
    }

    /// Long-format cortisol samples restricted to the current subset.
    ///
    /// # Errors
    ///
    /// Same surface as [`RawDataset::questionnaire`].
    pub fn cortisol(&self) -> Result<RecordBatch> {
        self.saliva("cortisol")
    }

    /// Long-format saliva samples of one type.
    ///
    /// # Errors
    ///
    /// Same surface as [`RawDataset::questionnaire`].
    pub fn saliva(&self, saliva_type: &str) -> Result<RecordBatch> {
        check_access(DataCategory::Saliva, &self.index)?;
        let path = self
            .base_path
            .join("saliva/processed")
            .join(format!("{saliva_type}_samples.csv"));
        let batch = io::load_csv_table(&path)?;
        super::select_subjects_conditions(&batch, &self.index)
    }

    /// Distinct (subject, condition) pairs of the current subset.
    #[must_use]
    pub fn condition_list(&self) -> Vec<SubjectCondition> {
        self.index.subject_conditions()
    }

    /// Recording folders of all subjects on storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the `ecg` directory cannot be read.
    pub fn subject_dirs(&self) -> Result<Vec<PathBuf>> {
        storage::subject_dirs(&self.base_path)
    }

    /// Create the `processed` output directory of the addressed
    /// subject and return the canonical result paths within it.
    ///
    /// The sole side-effecting accessor. On a multi-subject subset a
    /// diagnostic notice is emitted and the paths are computed from
    /// the first subject — tolerated, but discouraged.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or the subset is
    /// empty.
    pub fn setup_export_paths(&self) -> Result<ExportPaths> {
        if self.index.subjects().len() != 1 {
            tracing::warn!("only supported for a single participant, using the first subject");
        }
        let subject = self.single_subject()?;
        let processed = self.base_path.join("ecg").join(&subject).join("processed");
        std::fs::create_dir_all(&processed)?;
        Ok(ExportPaths {
            hr_result: processed.join(format!("hr_result_{subject}.parquet")),
            rpeaks_result: processed.join(format!("rpeaks_result_{subject}.parquet")),
            hrv_continuous: processed.join(format!("hrv_continuous_{subject}.parquet")),
        })
    }

    fn single_subject(&self) -> Result<String> {
        self.index
            .subjects()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Schema("current subset addresses no subjects".to_string()))
    }

    fn load_session(&self, subject: &str, selected: &[String]) -> Result<Arc<RecordingSession>> {
        let streams = vec!["ecg".to_string()];
        if self.use_cache {
            let key = RecordingKey {
                base_path: self.base_path.clone(),
                subject: subject.to_string(),
                phase_names: self.phases.clone(),
                selected_phases: selected.to_vec(),
                streams: streams.clone(),
            };
            self.cache().get_or_load(&key, || {
                storage::load_subject_recordings(
                    &self.base_path,
                    subject,
                    &self.phases,
                    selected,
                    &streams,
                )
            })
        } else {
            Ok(Arc::new(storage::load_subject_recordings(
                &self.base_path,
                subject,
                &self.phases,
                selected,
                &streams,
            )?))
        }
    }

    fn cache(&self) -> &RecordingCache {
        self.cache.as_deref().unwrap_or_else(|| cache::global())
    }

    fn narrowed(&self, index: DatasetIndex) -> Self {
        Self {
            base_path: self.base_path.clone(),
            index,
            phases: self.phases.clone(),
            use_cache: self.use_cache,
            cache: self.cache.clone(),
            ecg_cell: OnceLock::new(),
        }
    }
}

/// Builder for [`RawDataset`].
#[derive(Debug)]
pub struct RawDatasetBuilder {
    base_path: PathBuf,
    use_cache: bool,
    exclude_subjects: bool,
    cache: Option<Arc<RecordingCache>>,
}

impl RawDatasetBuilder {
    /// Route ECG loads through the bounded recording cache
    /// (default: on).
    #[must_use]
    pub const fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Apply the subject exclusion filter at index construction
    /// (default: off for raw datasets).
    #[must_use]
    pub const fn exclude_subjects(mut self, exclude_subjects: bool) -> Self {
        self.exclude_subjects = exclude_subjects;
        self
    }

    /// Use a dedicated recording cache instead of the process-wide
    /// one.
    #[must_use]
    pub fn recording_cache(mut self, cache: Arc<RecordingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the dataset: load the condition assignment and construct
    /// the subject × phase index.
    ///
    /// # Errors
    ///
    /// Condition-list reader errors propagate unchanged.
    pub fn build(self) -> Result<RawDataset> {
        let conditions =
            io::load_subject_condition_list(&self.base_path.join("condition_list.csv"))?;
        let phases: Vec<String> = PHASES.iter().map(ToString::to_string).collect();
        let mut index = DatasetIndex::from_condition_product(&conditions, &phases);
        if self.exclude_subjects {
            index = super::apply_exclusion(index, &self.base_path)?;
        }
        Ok(RawDataset {
            base_path: self.base_path,
            index,
            phases,
            use_cache: self.use_cache,
            cache: self.cache,
            ecg_cell: OnceLock::new(),
        })
    }
}
