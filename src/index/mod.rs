//! Dataset index — the addressable key space of a dataset
//!
//! Every dataset instance exposes a flat tabular index with one row per
//! addressable unit of data: (condition, subject, phase) for raw
//! recordings, plus a subphase level for processed feature tables. All
//! selection, filtering and grouping operate on this index, never on
//! storage paths directly. Rows describe data that is *expected* to
//! exist on storage; loaders fail if it does not.

mod granularity;

pub use granularity::{check_access, DataCategory, Granularity};

use crate::io::SubjectCondition;
use std::collections::BTreeSet;

/// One addressable unit of data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRow {
    /// Experimental condition the subject was assigned to
    pub condition: String,
    /// Subject identifier
    pub subject: String,
    /// Protocol phase (e.g. `Pre`, `MIST1`)
    pub phase: String,
    /// Subphase within the phase; only present for processed datasets
    pub subphase: Option<String>,
}

/// Flat tabular index of a dataset.
///
/// Built once at construction and immutable thereafter; subset
/// operations return new narrowed values instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetIndex {
    rows: Vec<IndexRow>,
    has_subphase: bool,
}

impl DatasetIndex {
    /// Build the raw-dataset index: the cartesian product of all
    /// subjects in the condition assignment with the fixed phase
    /// sequence, left-joined with the per-subject condition label.
    #[must_use]
    pub fn from_condition_product(conditions: &[SubjectCondition], phases: &[String]) -> Self {
        let mut rows = Vec::with_capacity(conditions.len() * phases.len());
        let mut seen = BTreeSet::new();
        for entry in conditions {
            // first assignment wins for duplicated subject rows
            if !seen.insert(entry.subject.as_str()) {
                continue;
            }
            for phase in phases {
                rows.push(IndexRow {
                    condition: entry.condition.clone(),
                    subject: entry.subject.clone(),
                    phase: phase.clone(),
                    subphase: None,
                });
            }
        }
        Self {
            rows,
            has_subphase: false,
        }
    }

    /// Build the processed-dataset index directly from the distinct
    /// {condition, subject, phase, subphase} rows of a feature table.
    #[must_use]
    pub fn from_feature_rows(rows: impl IntoIterator<Item = IndexRow>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let rows: Vec<IndexRow> = rows
            .into_iter()
            .filter(|row| seen.insert(row.clone()))
            .collect();
        Self {
            rows,
            has_subphase: true,
        }
    }

    /// Drop every row whose subject appears in the exclusion list.
    #[must_use]
    pub fn without_subjects(&self, excluded: &BTreeSet<String>) -> Self {
        self.filter(|row| !excluded.contains(&row.subject))
    }

    /// New index keeping only rows matching the predicate.
    #[must_use]
    pub fn filter(&self, keep: impl Fn(&IndexRow) -> bool) -> Self {
        Self {
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
            has_subphase: self.has_subphase,
        }
    }

    /// All rows, in index order.
    #[must_use]
    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    /// Number of index rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the index contains no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether this index carries a subphase level.
    #[must_use]
    pub fn has_subphase(&self) -> bool {
        self.has_subphase
    }

    /// Unique subjects, in first-seen order.
    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        unique(self.rows.iter().map(|row| row.subject.as_str()))
    }

    /// Unique conditions, in first-seen order.
    #[must_use]
    pub fn conditions(&self) -> Vec<String> {
        unique(self.rows.iter().map(|row| row.condition.as_str()))
    }

    /// Unique phases, in first-seen order.
    #[must_use]
    pub fn phases(&self) -> Vec<String> {
        unique(self.rows.iter().map(|row| row.phase.as_str()))
    }

    /// Unique subphases, in first-seen order. Empty for raw indices.
    #[must_use]
    pub fn subphases(&self) -> Vec<String> {
        unique(
            self.rows
                .iter()
                .filter_map(|row| row.subphase.as_deref()),
        )
    }

    /// Unique (subject, condition) pairs, in first-seen order.
    #[must_use]
    pub fn subject_conditions(&self) -> Vec<SubjectCondition> {
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .filter(|row| seen.insert((row.subject.as_str(), row.condition.as_str())))
            .map(|row| SubjectCondition {
                subject: row.subject.clone(),
                condition: row.condition.clone(),
            })
            .collect()
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(ToOwned::to_owned)
        .collect()
}
