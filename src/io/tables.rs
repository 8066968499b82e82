//! Arrow table helpers for index-level selection
//!
//! Long-format backing tables are addressed by string index levels
//! (condition, subject, phase, subphase, category). Selection follows
//! the index, not storage paths: keys are selected level by level in
//! request order, and feature slices are restricted by membership in
//! the current dataset index.

use crate::index::DatasetIndex;
use crate::{Error, Result};
use arrow::array::{Array, BooleanArray, StringArray};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;

/// Downcast one column to a string array.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the column is missing or not Utf8.
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::Schema(format!("missing index level column {name:?}")))?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Schema(format!("index level column {name:?} is not a string column")))
}

/// Select rows whose `level` value equals one of `keys`, concatenated
/// in key order (the order of selection across levels is significant
/// and preserved).
///
/// # Errors
///
/// Returns [`Error::KeyNotFound`] for a key with no matching rows.
pub fn multi_xs(batch: &RecordBatch, keys: &[String], level: &str) -> Result<RecordBatch> {
    let parts = select_keys(batch, keys, level, true)?;
    Ok(concat_batches(&batch.schema(), &parts)?)
}

/// Like [`multi_xs`], but keys absent from the table are silently
/// skipped instead of failing.
///
/// # Errors
///
/// Propagates Arrow failures from the filter kernels.
pub fn multi_xs_present(batch: &RecordBatch, keys: &[String], level: &str) -> Result<RecordBatch> {
    let parts = select_keys(batch, keys, level, false)?;
    Ok(concat_batches(&batch.schema(), &parts)?)
}

fn select_keys(
    batch: &RecordBatch,
    keys: &[String],
    level: &str,
    strict: bool,
) -> Result<Vec<RecordBatch>> {
    let column = string_column(batch, level)?;
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let mask: BooleanArray = column
            .iter()
            .map(|value| Some(value == Some(key.as_str())))
            .collect();
        let part = filter_record_batch(batch, &mask)?;
        if part.num_rows() == 0 {
            if strict {
                return Err(Error::KeyNotFound {
                    level: level.to_string(),
                    key: key.clone(),
                });
            }
            continue;
        }
        parts.push(part);
    }
    Ok(parts)
}

/// Restrict a long-format table to rows addressed by the dataset
/// index (inner-join semantics: feature rows without an index row are
/// dropped, index rows without a feature row are silently omitted).
///
/// # Errors
///
/// Returns [`Error::Schema`] if the table lacks an index level column.
pub fn semi_join_index(batch: &RecordBatch, index: &DatasetIndex) -> Result<RecordBatch> {
    let condition = string_column(batch, "condition")?;
    let subject = string_column(batch, "subject")?;
    let phase = string_column(batch, "phase")?;
    let subphase = if index.has_subphase() {
        Some(string_column(batch, "subphase")?)
    } else {
        None
    };

    let keys: HashSet<(&str, &str, &str, Option<&str>)> = index
        .rows()
        .iter()
        .map(|row| {
            (
                row.condition.as_str(),
                row.subject.as_str(),
                row.phase.as_str(),
                row.subphase.as_deref(),
            )
        })
        .collect();

    let mask: BooleanArray = (0..batch.num_rows())
        .map(|row| {
            let key = (
                condition.value(row),
                subject.value(row),
                phase.value(row),
                subphase.map(|column| column.value(row)),
            );
            Some(keys.contains(&key))
        })
        .collect();
    Ok(filter_record_batch(batch, &mask)?)
}

/// Project the named columns, in the given order.
///
/// # Errors
///
/// Returns [`Error::KeyNotFound`] for a column absent from the table.
pub fn project_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let idx = schema.index_of(name).map_err(|_| Error::KeyNotFound {
            level: "column".to_string(),
            key: name.clone(),
        })?;
        indices.push(idx);
    }
    Ok(batch.project(&indices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn long_table() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("condition", DataType::Utf8, false),
            Field::new("subject", DataType::Utf8, false),
            Field::new("phase", DataType::Utf8, false),
            Field::new("data", DataType::Float64, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["CFT", "CFT", "Control", "Control"])),
                Arc::new(StringArray::from(vec!["Vp01", "Vp01", "Vp02", "Vp03"])),
                Arc::new(StringArray::from(vec!["Pre", "MIST1", "Pre", "Pre"])),
                Arc::new(Float64Array::from(vec![60.0, 85.0, 62.0, 64.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_multi_xs_preserves_selector_order() {
        let batch = long_table();
        let selected = multi_xs(
            &batch,
            &["Vp02".to_string(), "Vp01".to_string()],
            "subject",
        )
        .unwrap();

        let subjects = string_column(&selected, "subject").unwrap();
        let order: Vec<&str> = (0..selected.num_rows()).map(|row| subjects.value(row)).collect();
        assert_eq!(order, vec!["Vp02", "Vp01", "Vp01"]);
    }

    #[test]
    fn test_multi_xs_missing_key_fails() {
        let batch = long_table();
        let err = multi_xs(&batch, &["Vp99".to_string()], "subject").unwrap_err();
        match err {
            Error::KeyNotFound { level, key } => {
                assert_eq!(level, "subject");
                assert_eq!(key, "Vp99");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multi_xs_present_skips_missing() {
        let batch = long_table();
        let selected = multi_xs_present(
            &batch,
            &["Vp99".to_string(), "Vp03".to_string()],
            "subject",
        )
        .unwrap();
        assert_eq!(selected.num_rows(), 1);
    }

    #[test]
    fn test_semi_join_drops_both_sides() {
        let batch = long_table();
        // index addresses Vp01 for Pre and Post; the table has no Post
        // row (silently omitted) and its other subjects drop out
        let index = DatasetIndex::from_condition_product(
            &[crate::io::SubjectCondition {
                subject: "Vp01".into(),
                condition: "CFT".into(),
            }],
            &["Pre".to_string(), "Post".to_string()],
        );

        let joined = semi_join_index(&batch, &index).unwrap();
        assert_eq!(joined.num_rows(), 1);
        assert_eq!(string_column(&joined, "phase").unwrap().value(0), "Pre");
    }

    #[test]
    fn test_project_columns_missing_fails() {
        let batch = long_table();
        let err = project_columns(&batch, &["hr".to_string()]).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }
}
