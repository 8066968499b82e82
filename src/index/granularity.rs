//! Granularity guard for dataset accessors
//!
//! The current index subset is classified once per access into an
//! enumerated granularity tag; a per-category rule table then decides
//! whether the requested data category may legally be evaluated at that
//! granularity. Violations surface as [`crate::Error::Granularity`]
//! with a message naming the broken rule.

use super::DatasetIndex;
use crate::{Error, Result};

/// How narrowly the current index subset pins subject/phase/subphase.
///
/// Classification is most-specific-first: a subset that is a single
/// index row classifies as [`Granularity::SinglePoint`] even though the
/// broader predicates hold as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Exactly one index row; every level pinned
    SinglePoint,
    /// One (subject, condition, subphase) combination, several phases
    SingleSubjectSubphase,
    /// One (subject, condition, phase) combination, several subphases
    SingleSubjectPhase,
    /// One (subject, condition) combination, several phases
    SingleSubjectCondition,
    /// One phase across several subjects
    SinglePhase,
    /// One subphase across several subjects or phases
    SingleSubphase,
    /// No single-level restriction applies
    Multiple,
}

impl Granularity {
    /// Classify the current index subset.
    #[must_use]
    pub fn classify(index: &DatasetIndex) -> Self {
        if index.len() == 1 {
            return Self::SinglePoint;
        }
        let single_subject_condition = index.subject_conditions().len() == 1;
        if single_subject_condition && index.has_subphase() && index.subphases().len() == 1 {
            return Self::SingleSubjectSubphase;
        }
        if single_subject_condition && index.phases().len() == 1 {
            return Self::SingleSubjectPhase;
        }
        if single_subject_condition {
            return Self::SingleSubjectCondition;
        }
        if index.phases().len() == 1 {
            return Self::SinglePhase;
        }
        if index.has_subphase() && index.subphases().len() == 1 {
            return Self::SingleSubphase;
        }
        Self::Multiple
    }
}

/// Data categories with granularity rules attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCategory {
    /// Raw ECG signal of one subject
    EcgSignal,
    /// Wide per-subject questionnaire scores
    Questionnaire,
    /// Long-format saliva samples or features
    Saliva,
    /// Ensemble-averaged heart rate, aligned per phase across subjects
    HrEnsemble,
}

impl DataCategory {
    /// Stable name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EcgSignal => "ecg",
            Self::Questionnaire => "questionnaire",
            Self::Saliva => "saliva",
            Self::HrEnsemble => "hr_ensemble",
        }
    }

    /// Whether access is legal at the given granularity.
    #[must_use]
    pub fn allows(self, granularity: Granularity) -> bool {
        use Granularity::{
            SinglePhase, SinglePoint, SingleSubjectCondition, SingleSubjectPhase,
            SingleSubjectSubphase, SingleSubphase,
        };
        match self {
            // legal only for a single subject, optionally narrowed to phases
            Self::EcgSignal => matches!(
                granularity,
                SinglePoint | SingleSubjectSubphase | SingleSubjectPhase | SingleSubjectCondition
            ),
            // per-subject-per-condition data, never per-phase or per-subphase
            Self::Questionnaire | Self::Saliva => !matches!(
                granularity,
                SinglePoint
                    | SingleSubjectSubphase
                    | SingleSubjectPhase
                    | SinglePhase
                    | SingleSubphase
            ),
            Self::HrEnsemble => !matches!(granularity, SinglePoint | SingleSubphase),
        }
    }

    const fn constraint(self) -> &'static str {
        match self {
            Self::EcgSignal => {
                "data can only be accessed for a single participant \
                 or a single phase of one single participant in the subset"
            }
            Self::Questionnaire | Self::Saliva => {
                "data can not be accessed for individual phases or subphases"
            }
            Self::HrEnsemble => "data can not be accessed for individual subphases",
        }
    }
}

/// Validate that `category` may be evaluated on the current subset.
///
/// # Errors
///
/// Returns [`Error::Granularity`] naming the violated rule otherwise.
pub fn check_access(category: DataCategory, index: &DatasetIndex) -> Result<()> {
    let granularity = Granularity::classify(index);
    if category.allows(granularity) {
        Ok(())
    } else {
        Err(Error::Granularity {
            category: category.name(),
            constraint: category.constraint().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexRow;

    fn index(rows: &[(&str, &str, &str, Option<&str>)]) -> DatasetIndex {
        DatasetIndex::from_feature_rows(rows.iter().map(|(condition, subject, phase, subphase)| {
            IndexRow {
                condition: (*condition).to_string(),
                subject: (*subject).to_string(),
                phase: (*phase).to_string(),
                subphase: subphase.map(ToString::to_string),
            }
        }))
    }

    fn raw_index(rows: &[(&str, &str, &str)]) -> DatasetIndex {
        use crate::io::SubjectCondition;
        // build via the product of distinct subjects x phases present
        let conditions: Vec<SubjectCondition> = {
            let mut seen = std::collections::HashSet::new();
            rows.iter()
                .filter(|row| seen.insert(row.1))
                .map(|(condition, subject, _)| SubjectCondition {
                    subject: (*subject).to_string(),
                    condition: (*condition).to_string(),
                })
                .collect()
        };
        let phases: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            rows.iter()
                .filter(|row| seen.insert(row.2))
                .map(|row| row.2.to_string())
                .collect()
        };
        DatasetIndex::from_condition_product(&conditions, &phases)
    }

    #[test]
    fn test_classify_single_point() {
        let idx = raw_index(&[("CFT", "Vp01", "Pre")]);
        assert_eq!(Granularity::classify(&idx), Granularity::SinglePoint);
    }

    #[test]
    fn test_classify_single_subject_condition() {
        let idx = raw_index(&[("CFT", "Vp01", "Pre"), ("CFT", "Vp01", "MIST1")]);
        assert_eq!(
            Granularity::classify(&idx),
            Granularity::SingleSubjectCondition
        );
    }

    #[test]
    fn test_classify_single_phase() {
        let idx = raw_index(&[("CFT", "Vp01", "Pre"), ("Control", "Vp02", "Pre")]);
        assert_eq!(Granularity::classify(&idx), Granularity::SinglePhase);
    }

    #[test]
    fn test_classify_multiple() {
        let idx = raw_index(&[
            ("CFT", "Vp01", "Pre"),
            ("CFT", "Vp01", "MIST1"),
            ("Control", "Vp02", "Pre"),
            ("Control", "Vp02", "MIST1"),
        ]);
        assert_eq!(Granularity::classify(&idx), Granularity::Multiple);
    }

    #[test]
    fn test_classify_single_subphase() {
        let idx = index(&[
            ("CFT", "Vp01", "MIST1", Some("BL")),
            ("Control", "Vp02", "MIST2", Some("BL")),
        ]);
        assert_eq!(Granularity::classify(&idx), Granularity::SingleSubphase);
    }

    #[test]
    fn test_classify_single_subject_phase() {
        let idx = index(&[
            ("CFT", "Vp01", "MIST1", Some("BL")),
            ("CFT", "Vp01", "MIST1", Some("AT")),
        ]);
        assert_eq!(Granularity::classify(&idx), Granularity::SingleSubjectPhase);
    }

    #[test]
    fn test_ecg_requires_single_subject() {
        let multi = raw_index(&[("CFT", "Vp01", "Pre"), ("Control", "Vp02", "Pre")]);
        let err = check_access(DataCategory::EcgSignal, &multi).unwrap_err();
        assert!(err.to_string().contains("single participant"));

        let single = raw_index(&[("CFT", "Vp01", "Pre"), ("CFT", "Vp01", "MIST1")]);
        check_access(DataCategory::EcgSignal, &single).unwrap();
    }

    #[test]
    fn test_questionnaire_forbids_single_phase() {
        let idx = raw_index(&[("CFT", "Vp01", "Pre"), ("Control", "Vp02", "Pre")]);
        let err = check_access(DataCategory::Questionnaire, &idx).unwrap_err();
        assert!(err
            .to_string()
            .contains("individual phases or subphases"));
    }

    #[test]
    fn test_questionnaire_allows_multi_subject_subset() {
        let idx = raw_index(&[
            ("CFT", "Vp01", "Pre"),
            ("CFT", "Vp01", "MIST1"),
            ("Control", "Vp02", "Pre"),
            ("Control", "Vp02", "MIST1"),
        ]);
        check_access(DataCategory::Questionnaire, &idx).unwrap();
        check_access(DataCategory::Saliva, &idx).unwrap();
    }

    #[test]
    fn test_ensemble_forbids_single_point_and_subphase() {
        let point = raw_index(&[("CFT", "Vp01", "Pre")]);
        assert!(check_access(DataCategory::HrEnsemble, &point).is_err());

        let subphase = index(&[
            ("CFT", "Vp01", "MIST1", Some("BL")),
            ("Control", "Vp02", "MIST2", Some("BL")),
        ]);
        assert!(check_access(DataCategory::HrEnsemble, &subphase).is_err());

        let ok = index(&[
            ("CFT", "Vp01", "MIST1", Some("BL")),
            ("CFT", "Vp01", "MIST1", Some("AT")),
            ("Control", "Vp02", "MIST2", Some("BL")),
        ]);
        check_access(DataCategory::HrEnsemble, &ok).unwrap();
    }
}
