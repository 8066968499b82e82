//! Error types for cft-dataset
//!
//! All violations are detected eagerly and propagated to the caller;
//! nothing is retried internally. Parser failures from the underlying
//! Arrow/Parquet/CSV readers propagate unchanged.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// cft-dataset error types
#[derive(Error, Debug)]
pub enum Error {
    /// Recording folder contains no recording files
    #[error("no recording files found in folder: {folder}")]
    NoDataFound {
        /// Folder that was scanned
        folder: String,
    },

    /// Number of supplied phase names does not match the number of recordings
    #[error("number of phases ({expected}) does not match number of recordings in the folder ({found})")]
    PhaseCountMismatch {
        /// Number of phase names supplied
        expected: usize,
        /// Number of recording files discovered
        found: usize,
    },

    /// Recordings of one session have different sampling rates
    #[error("recordings in the session have different sampling rates, got: {rates:?}")]
    InconsistentSamplingRate {
        /// Sampling rates found, in discovery order
        rates: Vec<f64>,
    },

    /// Accessor invoked at a disallowed index granularity
    #[error("{category} data cannot be accessed here: {constraint}")]
    Granularity {
        /// Data category that was requested
        category: &'static str,
        /// The granularity rule that was violated
        constraint: String,
    },

    /// Multi-level selection addressed a key absent from the backing file
    #[error("key {key:?} not found at index level {level:?}")]
    KeyNotFound {
        /// Index level the lookup ran against
        level: String,
        /// The missing key
        key: String,
    },

    /// Malformed backing file (missing column, bad cell, empty table)
    #[error("schema error: {0}")]
    Schema(String),

    /// Storage error with context
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
