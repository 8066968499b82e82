//! Raw recording storage
//!
//! Scans a per-subject folder for ordered recording files, parses each
//! into a homogeneous Arrow table plus its sampling rate, trims the
//! end-of-recording artifact, and validates a single common sampling
//! rate across the session.

mod recording;

pub use recording::{read_recording, RecordingMeta};

use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use std::path::{Path, PathBuf};

/// One subject's recording session: a phase-keyed mapping of signal
/// tables in discovery order, plus the shared sampling rate.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    phases: Vec<(String, RecordBatch)>,
    sampling_rate_hz: f64,
}

impl RecordingSession {
    /// Phase names in discovery order.
    #[must_use]
    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Signal table of one phase.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&RecordBatch> {
        self.phases
            .iter()
            .find(|(phase, _)| phase == name)
            .map(|(_, batch)| batch)
    }

    /// Phase/table pairs in discovery order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordBatch)> {
        self.phases
            .iter()
            .map(|(name, batch)| (name.as_str(), batch))
    }

    /// Number of phases in the session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the session holds no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Common sampling rate of all recordings in the session.
    #[must_use]
    pub fn sampling_rate_hz(&self) -> f64 {
        self.sampling_rate_hz
    }

    /// New session keeping only the given phases, in session order.
    #[must_use]
    pub fn select_phases(&self, selected: &[String]) -> Self {
        Self {
            phases: self
                .phases
                .iter()
                .filter(|(name, _)| selected.iter().any(|phase| phase == name))
                .cloned()
                .collect(),
            sampling_rate_hz: self.sampling_rate_hz,
        }
    }
}

/// Load all recordings of one folder into a phase-keyed session.
///
/// Candidate files of both container formats (`*.parquet`, `*.csv`)
/// are ordered together as one lexicographically sorted list. Phase
/// names default to `Part0, Part1, ...` in discovery order. The last
/// `floor(sampling_rate)` samples of every table are trimmed (a known
/// end-of-recording artifact). An optional stream selector projects
/// channel columns.
///
/// # Errors
///
/// - [`Error::NoDataFound`] if the folder holds no recording files
/// - [`Error::PhaseCountMismatch`] if `phase_names` does not match the
///   number of discovered files
/// - [`Error::InconsistentSamplingRate`] if the files disagree on the
///   sampling rate
pub fn load_recording_folder(
    folder: &Path,
    phase_names: Option<&[String]>,
    streams: Option<&[String]>,
) -> Result<RecordingSession> {
    let files = discover_recordings(folder)?;
    if files.is_empty() {
        return Err(Error::NoDataFound {
            folder: folder.display().to_string(),
        });
    }

    let names: Vec<String> = match phase_names {
        Some(names) => names.to_vec(),
        None => (0..files.len()).map(|idx| format!("Part{idx}")).collect(),
    };
    if names.len() != files.len() {
        return Err(Error::PhaseCountMismatch {
            expected: names.len(),
            found: files.len(),
        });
    }

    let mut parsed = Vec::with_capacity(files.len());
    for path in &files {
        let (batch, meta) = read_recording(path)?;
        parsed.push((trim_tail(&batch, meta.sampling_rate_hz), meta));
    }

    let rates: Vec<f64> = parsed.iter().map(|(_, meta)| meta.sampling_rate_hz).collect();
    if rates
        .windows(2)
        .any(|pair| (pair[0] - pair[1]).abs() > f64::EPSILON)
    {
        return Err(Error::InconsistentSamplingRate { rates });
    }
    let sampling_rate_hz = rates[0];

    let mut phases = Vec::with_capacity(parsed.len());
    for (name, (batch, _)) in names.into_iter().zip(parsed) {
        let batch = match streams {
            Some(streams) => project_streams(&batch, streams)?,
            None => batch,
        };
        phases.push((name, batch));
    }

    Ok(RecordingSession {
        phases,
        sampling_rate_hz,
    })
}

/// Load one subject's ECG session from `<base>/ecg/<subject>/`,
/// narrowed to the selected phases and streams.
///
/// # Errors
///
/// Propagates every [`load_recording_folder`] failure.
pub fn load_subject_recordings(
    base_path: &Path,
    subject_id: &str,
    phase_names: &[String],
    selected_phases: &[String],
    streams: &[String],
) -> Result<RecordingSession> {
    let folder = base_path.join("ecg").join(subject_id);
    let session = load_recording_folder(&folder, Some(phase_names), Some(streams))?;
    Ok(session.select_phases(selected_phases))
}

/// Recording folders under `<base>/ecg/` following the study's
/// subject-id naming scheme, sorted by name.
///
/// # Errors
///
/// Returns an error if the `ecg` directory cannot be read.
pub fn subject_dirs(base_path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(base_path.join("ecg"))? {
        let entry = entry?;
        let is_subject = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with("Vp"));
        if is_subject && entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn discover_recordings(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NoDataFound {
                folder: folder.display().to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if matches!(ext.as_str(), "parquet" | "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Trim the last 1-second span (`floor(sampling_rate)` samples).
fn trim_tail(batch: &RecordBatch, sampling_rate_hz: f64) -> RecordBatch {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tail = sampling_rate_hz.max(0.0).floor() as usize;
    let length = batch.num_rows().saturating_sub(tail);
    batch.slice(0, length)
}

fn project_streams(batch: &RecordBatch, streams: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut indices = Vec::with_capacity(streams.len() + 1);
    // keep the time column in front when present
    if let Ok(idx) = schema.index_of("time") {
        indices.push(idx);
    }
    for stream in streams {
        let idx = schema.index_of(stream).map_err(|_| {
            Error::Schema(format!("requested datastream {stream:?} not in recording"))
        })?;
        if !indices.contains(&idx) {
            indices.push(idx);
        }
    }
    Ok(batch.project(&indices)?)
}
