//! Long-format reshaping of wide per-subject result tables
//!
//! Statistical analysis downstream expects one observation per row:
//! index levels, a `type` level naming the measure, and a single
//! `data` value column. These helpers stack wide result tables into
//! that shape.

use crate::io::SubjectCondition;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;

/// Stack the given wide value columns into long format.
///
/// Output columns are the id columns (in the given order), a `type`
/// column holding the source column name, and a `data` column with
/// the value. Null values are dropped, matching the usual long-format
/// convention.
///
/// # Errors
///
/// Returns [`Error::Schema`] if an id column is not Utf8 or a value
/// column is not Float64.
pub fn stack_to_long(
    batch: &RecordBatch,
    id_cols: &[&str],
    value_cols: &[&str],
) -> Result<RecordBatch> {
    let ids = id_columns(batch, id_cols)?;
    let values = value_columns(batch, value_cols)?;

    let mut id_out: Vec<Vec<String>> = vec![Vec::new(); ids.len()];
    let mut type_out: Vec<&str> = Vec::new();
    let mut data_out: Vec<f64> = Vec::new();
    for row in 0..batch.num_rows() {
        for (name, column) in value_cols.iter().zip(&values) {
            if column.is_null(row) {
                continue;
            }
            for (out, column) in id_out.iter_mut().zip(&ids) {
                out.push(column.value(row).to_string());
            }
            type_out.push(*name);
            data_out.push(column.value(row));
        }
    }

    let mut fields: Vec<Field> = id_cols
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, false))
        .collect();
    fields.push(Field::new("type", DataType::Utf8, false));
    fields.push(Field::new("data", DataType::Float64, false));

    let mut arrays: Vec<ArrayRef> = id_out
        .into_iter()
        .map(|column| Arc::new(StringArray::from(column)) as ArrayRef)
        .collect();
    arrays.push(Arc::new(StringArray::from(type_out)));
    arrays.push(Arc::new(Float64Array::from(data_out)));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Prepend a constant index level to every row (e.g. a `subphase`
/// level fixed to `Total` for per-phase tables).
///
/// # Errors
///
/// Propagates Arrow failures when rebuilding the batch.
pub fn with_constant_level(batch: &RecordBatch, level: &str, value: &str) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(level, DataType::Utf8, false)];
    fields.extend(
        batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.as_ref().clone()),
    );
    let mut arrays: Vec<ArrayRef> =
        vec![Arc::new(StringArray::from(vec![value; batch.num_rows()]))];
    arrays.extend(batch.columns().iter().cloned());
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Combine mean-HR and normalized-mean-HR wide tables into one long
/// table with `type` ∈ {`HR`, `HR_Norm`}.
///
/// Both inputs carry the same id columns (every Utf8 column, in
/// order) and exactly one Float64 value column each.
///
/// # Errors
///
/// Returns [`Error::Schema`] on mismatched row counts or a missing
/// value column.
pub fn reshape_hr(hr_mean: &RecordBatch, hr_mean_normalized: &RecordBatch) -> Result<RecordBatch> {
    if hr_mean.num_rows() != hr_mean_normalized.num_rows() {
        return Err(Error::Schema(format!(
            "hr tables disagree on length: {} vs {}",
            hr_mean.num_rows(),
            hr_mean_normalized.num_rows()
        )));
    }
    let schema = hr_mean.schema();
    let id_cols: Vec<&str> = schema
        .fields()
        .iter()
        .filter(|field| field.data_type() == &DataType::Utf8)
        .map(|field| field.name().as_str())
        .collect();
    let ids = id_columns(hr_mean, &id_cols)?;
    let hr = single_value_column(hr_mean)?;
    let hr_norm = single_value_column(hr_mean_normalized)?;

    let mut fields: Vec<Field> = id_cols
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, false))
        .collect();
    fields.push(Field::new("type", DataType::Utf8, false));
    fields.push(Field::new("data", DataType::Float64, false));

    let mut id_out: Vec<Vec<String>> = vec![Vec::new(); ids.len()];
    let mut type_out: Vec<&str> = Vec::new();
    let mut data_out: Vec<f64> = Vec::new();
    for row in 0..hr_mean.num_rows() {
        for (value, label) in [(hr, "HR"), (hr_norm, "HR_Norm")] {
            if value.is_null(row) {
                continue;
            }
            for (out, column) in id_out.iter_mut().zip(&ids) {
                out.push(column.value(row).to_string());
            }
            type_out.push(label);
            data_out.push(value.value(row));
        }
    }

    let mut arrays: Vec<ArrayRef> = id_out
        .into_iter()
        .map(|column| Arc::new(StringArray::from(column)) as ArrayRef)
        .collect();
    arrays.push(Arc::new(StringArray::from(type_out)));
    arrays.push(Arc::new(Float64Array::from(data_out)));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// CFT parameter rows dropped from the long-format output: both are
/// intermediate detection artifacts, not analysis measures.
const DROPPED_CFT_PARAMS: [&str; 2] = ["onset", "peak_brady"];

/// Reshape a wide per-(subject, phase) CFT parameter table into long
/// format: join the condition assignment, fix the subphase level to
/// `Total`, stack parameters into {type, data}, and drop the
/// non-measure parameters.
///
/// # Errors
///
/// Returns [`Error::KeyNotFound`] for a subject absent from the
/// condition assignment, [`Error::Schema`] for missing id columns.
pub fn reshape_cft_params(
    cft_params: &RecordBatch,
    condition_list: &[SubjectCondition],
) -> Result<RecordBatch> {
    let conditions: HashMap<&str, &str> = condition_list
        .iter()
        .map(|entry| (entry.subject.as_str(), entry.condition.as_str()))
        .collect();
    let ids = id_columns(cft_params, &["subject", "phase"])?;
    let schema = cft_params.schema();
    let param_cols: Vec<&str> = schema
        .fields()
        .iter()
        .filter(|field| {
            field.data_type() == &DataType::Float64
                && !DROPPED_CFT_PARAMS.contains(&field.name().as_str())
        })
        .map(|field| field.name().as_str())
        .collect();
    let values = value_columns(cft_params, &param_cols)?;

    let mut condition_out: Vec<&str> = Vec::new();
    let mut subject_out: Vec<String> = Vec::new();
    let mut phase_out: Vec<String> = Vec::new();
    let mut type_out: Vec<&str> = Vec::new();
    let mut data_out: Vec<f64> = Vec::new();
    for row in 0..cft_params.num_rows() {
        let subject = ids[0].value(row);
        let condition = conditions
            .get(subject)
            .copied()
            .ok_or_else(|| Error::KeyNotFound {
                level: "subject".to_string(),
                key: subject.to_string(),
            })?;
        for (name, column) in param_cols.iter().zip(&values) {
            if column.is_null(row) {
                continue;
            }
            condition_out.push(condition);
            subject_out.push(subject.to_string());
            phase_out.push(ids[1].value(row).to_string());
            type_out.push(*name);
            data_out.push(column.value(row));
        }
    }

    let total = vec!["Total"; type_out.len()];
    let schema = Schema::new(vec![
        Field::new("condition", DataType::Utf8, false),
        Field::new("subject", DataType::Utf8, false),
        Field::new("phase", DataType::Utf8, false),
        Field::new("subphase", DataType::Utf8, false),
        Field::new("type", DataType::Utf8, false),
        Field::new("data", DataType::Float64, false),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(condition_out)),
            Arc::new(StringArray::from(subject_out)),
            Arc::new(StringArray::from(phase_out)),
            Arc::new(StringArray::from(total)),
            Arc::new(StringArray::from(type_out)),
            Arc::new(Float64Array::from(data_out)),
        ],
    )?)
}

fn id_columns<'a>(batch: &'a RecordBatch, names: &[&str]) -> Result<Vec<&'a StringArray>> {
    names
        .iter()
        .map(|name| crate::io::string_column(batch, name))
        .collect()
}

fn value_columns<'a>(batch: &'a RecordBatch, names: &[&str]) -> Result<Vec<&'a Float64Array>> {
    names
        .iter()
        .map(|name| {
            let idx = batch
                .schema()
                .index_of(name)
                .map_err(|_| Error::Schema(format!("missing value column {name:?}")))?;
            batch
                .column(idx)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| Error::Schema(format!("value column {name:?} is not Float64")))
        })
        .collect()
}

fn single_value_column(batch: &RecordBatch) -> Result<&Float64Array> {
    let schema = batch.schema();
    let mut values = schema.fields().iter().enumerate().filter_map(|(idx, field)| {
        if field.data_type() == &DataType::Float64 {
            Some(idx)
        } else {
            None
        }
    });
    let idx = values
        .next()
        .ok_or_else(|| Error::Schema("table carries no value column".to_string()))?;
    if values.next().is_some() {
        return Err(Error::Schema(
            "table carries more than one value column".to_string(),
        ));
    }
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Schema("value column is not Float64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::string_column;

    fn wide_hr(values: &[Option<f64>]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("subject", DataType::Utf8, false),
            Field::new("phase", DataType::Utf8, false),
            Field::new("hr_mean", DataType::Float64, true),
        ]);
        let subjects: Vec<String> = (0..values.len()).map(|row| format!("Vp{row:02}")).collect();
        let phases = vec!["MIST1"; values.len()];
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(subjects)),
                Arc::new(StringArray::from(phases)),
                Arc::new(Float64Array::from(values.to_vec())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_stack_to_long_drops_nulls() {
        let batch = wide_hr(&[Some(72.0), None, Some(65.5)]);
        let long = stack_to_long(&batch, &["subject", "phase"], &["hr_mean"]).unwrap();
        assert_eq!(long.num_rows(), 2);
        assert_eq!(string_column(&long, "type").unwrap().value(0), "hr_mean");
    }

    #[test]
    fn test_reshape_hr_interleaves_types() {
        let hr = wide_hr(&[Some(72.0), Some(80.0)]);
        let hr_norm = wide_hr(&[Some(1.0), Some(1.1)]);
        let long = reshape_hr(&hr, &hr_norm).unwrap();

        assert_eq!(long.num_rows(), 4);
        let types = string_column(&long, "type").unwrap();
        assert_eq!(types.value(0), "HR");
        assert_eq!(types.value(1), "HR_Norm");
    }

    #[test]
    fn test_reshape_cft_params_drops_detection_artifacts() {
        let schema = Schema::new(vec![
            Field::new("subject", DataType::Utf8, false),
            Field::new("phase", DataType::Utf8, false),
            Field::new("baseline_hr", DataType::Float64, true),
            Field::new("onset", DataType::Float64, true),
            Field::new("peak_brady", DataType::Float64, true),
            Field::new("mean_brady", DataType::Float64, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["Vp01"])),
                Arc::new(StringArray::from(vec!["MIST1"])),
                Arc::new(Float64Array::from(vec![Some(68.0)])),
                Arc::new(Float64Array::from(vec![Some(3.0)])),
                Arc::new(Float64Array::from(vec![Some(-12.0)])),
                Arc::new(Float64Array::from(vec![Some(-6.5)])),
            ],
        )
        .unwrap();
        let conditions = vec![SubjectCondition {
            subject: "Vp01".into(),
            condition: "CFT".into(),
        }];

        let long = reshape_cft_params(&batch, &conditions).unwrap();
        assert_eq!(long.num_rows(), 2);
        let types = string_column(&long, "type").unwrap();
        assert_eq!(types.value(0), "baseline_hr");
        assert_eq!(types.value(1), "mean_brady");
        assert_eq!(string_column(&long, "subphase").unwrap().value(0), "Total");
        assert_eq!(string_column(&long, "condition").unwrap().value(0), "CFT");
    }

    #[test]
    fn test_reshape_cft_params_unknown_subject_fails() {
        let batch = wide_hr(&[Some(72.0)]);
        let err = reshape_cft_params(&batch, &[]).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }

    #[test]
    fn test_with_constant_level_prepends() {
        let batch = wide_hr(&[Some(72.0)]);
        let out = with_constant_level(&batch, "subphase", "Total").unwrap();
        assert_eq!(out.schema().field(0).name(), "subphase");
        assert_eq!(string_column(&out, "subphase").unwrap().value(0), "Total");
        assert_eq!(out.num_columns(), 4);
    }
}
