//! Tests for error types

use cft_dataset::Error;

#[test]
fn test_no_data_found_error() {
    let error = Error::NoDataFound {
        folder: "/study/ecg/Vp01".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("no recording files found"));
    assert!(error_str.contains("/study/ecg/Vp01"));
}

#[test]
fn test_phase_count_mismatch_error() {
    let error = Error::PhaseCountMismatch {
        expected: 5,
        found: 4,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("number of phases (5)"));
    assert!(error_str.contains("recordings in the folder (4)"));
}

#[test]
fn test_inconsistent_sampling_rate_error() {
    let error = Error::InconsistentSamplingRate {
        rates: vec![256.0, 64.0],
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("different sampling rates"));
    assert!(error_str.contains("256"));
    assert!(error_str.contains("64"));
}

#[test]
fn test_granularity_error_names_constraint() {
    let error = Error::Granularity {
        category: "questionnaire",
        constraint: "data can not be accessed for individual phases or subphases".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("questionnaire"));
    assert!(error_str.contains("individual phases or subphases"));
}

#[test]
fn test_key_not_found_error() {
    let error = Error::KeyNotFound {
        level: "subject".to_string(),
        key: "Vp99".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("\"Vp99\""));
    assert!(error_str.contains("\"subject\""));
}

#[test]
fn test_schema_error() {
    let error = Error::Schema("missing index level column \"phase\"".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("schema error"));
    assert!(error_str.contains("phase"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Storage("unreadable".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Storage"));
}
