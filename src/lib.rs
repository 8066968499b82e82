//! # cft-dataset: Cold Face Test study data access
//!
//! Dataset indexing and slicing for physiological data recorded during
//! a Cold Face Test / Montreal Imaging Stress Task (MIST) protocol:
//! ECG-derived heart-rate and HRV signals, cortisol saliva samples and
//! questionnaire responses.
//!
//! Every dataset exposes a flat tabular index over
//! (condition, subject, phase\[, subphase\]) and loads Arrow tables
//! lazily behind it. A granularity guard decides which data categories
//! are legal to read at the current index specificity, and a bounded
//! LRU cache absorbs repeated parses of raw recording folders.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cft_dataset::RawDataset;
//!
//! let dataset = RawDataset::builder("data/cft_study").build()?;
//!
//! // narrow to one subject, then read the raw ECG of all phases
//! let subject = dataset.with_subjects(&["Vp01"]);
//! let ecg = subject.ecg()?;
//! # Ok::<(), cft_dataset::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod dataset;
pub mod error;
pub mod index;
pub mod io;
pub mod reshape;
pub mod storage;

pub use dataset::{ProcessedDataset, RawDataset};
pub use error::{Error, Result};
pub use index::{DataCategory, DatasetIndex, Granularity, IndexRow};
