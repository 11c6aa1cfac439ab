//! Arrow helpers for the tabular side of the binding layer.
//!
//! Data moves through the crate as [`RecordBatch`] frames. These functions
//! cover the frame surgery the bindings need: stitching per-field downloads
//! into one frame, renaming columns to their configured names, masking
//! sentinel values to nulls, and converting categorical columns between
//! label and code form.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, DictionaryArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::{DataType, Field, Int32Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow_schema::ArrowError;

use crate::error::{Error, Result};
use crate::table::{AttributeType, Sentinels};

/// A frame with no rows and no columns.
pub fn empty_frame() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(Schema::empty()))
}

/// Stitch several frames with identical row counts into one, columns in
/// argument order. Empty (zero-column) frames are skipped.
pub fn concat_columns(parts: Vec<RecordBatch>) -> Result<RecordBatch> {
    let parts: Vec<RecordBatch> = parts
        .into_iter()
        .filter(|part| part.num_columns() > 0)
        .collect();
    let Some(first) = parts.first() else {
        return Ok(empty_frame());
    };
    let rows = first.num_rows();
    let mut fields = Vec::new();
    let mut columns = Vec::new();
    for part in &parts {
        if part.num_rows() != rows {
            return Err(Error::Arrow(ArrowError::InvalidArgumentError(format!(
                "row count mismatch while combining frames: {} vs {}",
                part.num_rows(),
                rows
            ))));
        }
        for (field, column) in part.schema().fields().iter().zip(part.columns()) {
            fields.push(field.clone());
            columns.push(column.clone());
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Rebuild a frame with the given column names, preserving data. The name
/// count must match the column count.
pub fn rename_columns(batch: &RecordBatch, names: &[String], context: &str) -> Result<RecordBatch> {
    if names.len() != batch.num_columns() {
        return Err(Error::ColumnCountMismatch {
            context: context.to_string(),
            expected: names.len(),
            actual: batch.num_columns(),
        });
    }
    let fields: Vec<Field> = names
        .iter()
        .zip(batch.schema().fields())
        .map(|(name, field)| Field::new(name, field.data_type().clone(), true))
        .collect();
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        batch.columns().to_vec(),
    )?)
}

/// Wrap a single column into a one-column frame.
pub fn single_column_frame(name: &str, column: ArrayRef) -> Result<RecordBatch> {
    let field = Field::new(name, column.data_type().clone(), true);
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(vec![field])),
        vec![column],
    )?)
}

/// The only column of a one-column frame.
pub fn single_column(batch: &RecordBatch, context: &str) -> Result<(String, ArrayRef)> {
    if batch.num_columns() != 1 {
        return Err(Error::ColumnCountMismatch {
            context: context.to_string(),
            expected: 1,
            actual: batch.num_columns(),
        });
    }
    let name = batch.schema().field(0).name().clone();
    Ok((name, batch.column(0).clone()))
}

/// Project the named columns, in order, out of a wider frame.
pub fn select_columns(batch: &RecordBatch, names: &[String], context: &str) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let index = batch
            .schema()
            .index_of(name)
            .map_err(|_| Error::MissingColumn {
                context: context.to_string(),
                column: name.clone(),
            })?;
        fields.push(batch.schema().field(index).clone());
        columns.push(batch.column(index).clone());
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn downcast<'a, T: 'static>(column: &'a ArrayRef, context: &str) -> Result<&'a T> {
    column.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Arrow(ArrowError::CastError(format!(
            "column '{context}' is not the expected array type"
        )))
    })
}

/// Classify a column's Arrow type as an attribute storage type.
pub fn infer_attribute_type(column: &ArrayRef, name: &str) -> Result<AttributeType> {
    match column.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Ok(AttributeType::Integer),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Ok(AttributeType::Scalar),
        DataType::Boolean => Ok(AttributeType::Bool),
        // Categorical columns are dictionaries with int32 keys, the arrow
        // default; other key widths are not handled downstream.
        DataType::Dictionary(key, inner)
            if **key == DataType::Int32 && **inner == DataType::Utf8 =>
        {
            Ok(AttributeType::Category)
        }
        DataType::Utf8 | DataType::LargeUtf8 => Ok(AttributeType::String),
        other => Err(Error::UnsupportedAttributeType {
            column: name.to_string(),
            data_type: format!("{other:?}"),
        }),
    }
}

/// The encoding label written into table descriptors.
pub fn encoding_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Float64 => "float64".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::Int64 => "int64".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Boolean => "bool".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 => "string".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

fn is_sentinel_i64(sentinels: &Sentinels, value: i64) -> bool {
    match sentinels {
        Sentinels::Integer(list) => list.contains(&value),
        Sentinels::Continuous(list) => list.iter().any(|s| *s == value as f64),
    }
}

fn is_sentinel_f64(sentinels: &Sentinels, value: f64) -> bool {
    match sentinels {
        Sentinels::Integer(list) => list.iter().any(|s| *s as f64 == value),
        Sentinels::Continuous(list) => list.iter().any(|s| *s == value),
    }
}

/// Replace sentinel values with nulls. Non-numeric columns pass through
/// unchanged.
pub fn mask_sentinels(column: &ArrayRef, sentinels: &Sentinels, name: &str) -> Result<ArrayRef> {
    if sentinels.is_empty() {
        return Ok(column.clone());
    }
    match column.data_type() {
        DataType::Int64 => {
            let values = downcast::<Int64Array>(column, name)?;
            let masked: Int64Array = values
                .iter()
                .map(|v| v.filter(|value| !is_sentinel_i64(sentinels, *value)))
                .collect();
            Ok(Arc::new(masked))
        }
        DataType::Int32 => {
            let values = downcast::<Int32Array>(column, name)?;
            let masked: Int32Array = values
                .iter()
                .map(|v| v.filter(|value| !is_sentinel_i64(sentinels, i64::from(*value))))
                .collect();
            Ok(Arc::new(masked))
        }
        DataType::Float64 => {
            let values = downcast::<Float64Array>(column, name)?;
            let masked: Float64Array = values
                .iter()
                .map(|v| v.filter(|value| !is_sentinel_f64(sentinels, *value)))
                .collect();
            Ok(Arc::new(masked))
        }
        DataType::Float32 => {
            let values = downcast::<Float32Array>(column, name)?;
            let masked: Float32Array = values
                .iter()
                .map(|v| v.filter(|value| !is_sentinel_f64(sentinels, f64::from(*value))))
                .collect();
            Ok(Arc::new(masked))
        }
        _ => Ok(column.clone()),
    }
}

/// Replace integer codes with their labels from a lookup mapping. Codes
/// without a mapping entry become null.
pub fn decode_lookup(
    column: &ArrayRef,
    mapping: &HashMap<i64, String>,
    name: &str,
) -> Result<ArrayRef> {
    let labels: StringArray = match column.data_type() {
        DataType::Int64 => {
            let codes = downcast::<Int64Array>(column, name)?;
            codes
                .iter()
                .map(|code| code.and_then(|c| mapping.get(&c).map(String::as_str)))
                .collect()
        }
        DataType::Int32 => {
            let codes = downcast::<Int32Array>(column, name)?;
            codes
                .iter()
                .map(|code| code.and_then(|c| mapping.get(&i64::from(c)).map(String::as_str)))
                .collect()
        }
        other => {
            return Err(Error::UnsupportedAttributeType {
                column: name.to_string(),
                data_type: format!("{other:?}"),
            });
        }
    };
    Ok(Arc::new(labels))
}

/// Split a categorical column into integer codes and the label list the
/// codes index into. Accepts either a string column (labels are assigned
/// codes in order of first appearance) or an existing dictionary column.
pub fn dictionary_encode(column: &ArrayRef, name: &str) -> Result<(Int32Array, Vec<String>)> {
    match column.data_type() {
        DataType::Utf8 => {
            let values = downcast::<StringArray>(column, name)?;
            let mut labels: Vec<String> = Vec::new();
            let mut seen: HashMap<String, i32> = HashMap::new();
            let codes: Int32Array = values
                .iter()
                .map(|value| {
                    value.map(|label| match seen.get(label) {
                        Some(code) => *code,
                        None => {
                            let code = labels.len() as i32;
                            labels.push(label.to_string());
                            seen.insert(label.to_string(), code);
                            code
                        }
                    })
                })
                .collect();
            Ok((codes, labels))
        }
        DataType::Dictionary(key, inner)
            if **key == DataType::Int32 && **inner == DataType::Utf8 =>
        {
            let dictionary = downcast::<DictionaryArray<Int32Type>>(column, name)?;
            let values = downcast::<StringArray>(dictionary.values(), name)?;
            let labels: Vec<String> = (0..values.len()).map(|i| values.value(i).to_string()).collect();
            let codes: Int32Array = dictionary.keys().iter().collect();
            Ok((codes, labels))
        }
        other => Err(Error::UnsupportedAttributeType {
            column: name.to_string(),
            data_type: format!("{other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_frame(name: &str, values: Vec<f64>) -> RecordBatch {
        let column: ArrayRef = Arc::new(Float64Array::from(values));
        single_column_frame(name, column).unwrap()
    }

    #[test]
    fn test_concat_columns() {
        let combined = concat_columns(vec![
            float_frame("x", vec![1.0, 2.0]),
            empty_frame(),
            float_frame("y", vec![3.0, 4.0]),
        ])
        .unwrap();
        assert_eq!(combined.num_columns(), 2);
        assert_eq!(combined.schema().field(0).name(), "x");
        assert_eq!(combined.schema().field(1).name(), "y");

        let err = concat_columns(vec![
            float_frame("x", vec![1.0, 2.0]),
            float_frame("y", vec![3.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Arrow(_)));
    }

    #[test]
    fn test_rename_columns() {
        let batch = float_frame("0", vec![1.0]);
        let renamed = rename_columns(&batch, &["x".to_string()], "test").unwrap();
        assert_eq!(renamed.schema().field(0).name(), "x");

        let err = rename_columns(&batch, &["x".to_string(), "y".to_string()], "test").unwrap_err();
        assert!(matches!(err, Error::ColumnCountMismatch { .. }));
    }

    #[test]
    fn test_mask_sentinels_float() {
        let column: ArrayRef = Arc::new(Float64Array::from(vec![1.0, -9999.0, 3.0]));
        let masked = mask_sentinels(&column, &Sentinels::Continuous(vec![-9999.0]), "grade").unwrap();
        let masked = masked.as_any().downcast_ref::<Float64Array>().unwrap();
        assert!(masked.is_valid(0));
        assert!(masked.is_null(1));
        assert_eq!(masked.value(2), 3.0);
    }

    #[test]
    fn test_mask_sentinels_integer_column_with_integer_list() {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![0, -1, 7]));
        let masked = mask_sentinels(&column, &Sentinels::Integer(vec![-1]), "count").unwrap();
        let masked = masked.as_any().downcast_ref::<Int64Array>().unwrap();
        assert!(masked.is_null(1));
        assert_eq!(masked.value(2), 7);
    }

    #[test]
    fn test_dictionary_encode_strings() {
        let column: ArrayRef = Arc::new(StringArray::from(vec![
            Some("granite"),
            Some("schist"),
            Some("granite"),
            None,
        ]));
        let (codes, labels) = dictionary_encode(&column, "lith").unwrap();
        assert_eq!(labels, vec!["granite".to_string(), "schist".to_string()]);
        assert_eq!(codes.value(0), 0);
        assert_eq!(codes.value(1), 1);
        assert_eq!(codes.value(2), 0);
        assert!(codes.is_null(3));
    }

    #[test]
    fn test_dictionary_encode_int32_keyed_dictionary() {
        let dictionary: DictionaryArray<Int32Type> =
            vec!["granite", "schist", "granite"].into_iter().collect();
        let column: ArrayRef = Arc::new(dictionary);
        assert_eq!(
            infer_attribute_type(&column, "lith").unwrap(),
            AttributeType::Category
        );
        let (codes, labels) = dictionary_encode(&column, "lith").unwrap();
        assert_eq!(labels, vec!["granite".to_string(), "schist".to_string()]);
        assert_eq!(codes.value(0), 0);
        assert_eq!(codes.value(1), 1);
        assert_eq!(codes.value(2), 0);
    }

    #[test]
    fn test_dictionary_with_narrow_keys_is_unsupported() {
        use arrow::datatypes::Int8Type;

        let dictionary: DictionaryArray<Int8Type> =
            vec!["granite", "schist"].into_iter().collect();
        let column: ArrayRef = Arc::new(dictionary);

        let err = infer_attribute_type(&column, "lith").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAttributeType { .. }));
        let err = dictionary_encode(&column, "lith").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAttributeType { .. }));
    }

    #[test]
    fn test_decode_lookup() {
        let codes: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), Some(0), None, Some(9)]));
        let mapping: HashMap<i64, String> = [(0, "granite".to_string()), (1, "schist".to_string())]
            .into_iter()
            .collect();
        let labels = decode_lookup(&codes, &mapping, "lith").unwrap();
        let labels = labels.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(labels.value(0), "schist");
        assert_eq!(labels.value(1), "granite");
        assert!(labels.is_null(2));
        // Unmapped codes are masked rather than invented.
        assert!(labels.is_null(3));
    }

    #[test]
    fn test_infer_attribute_type() {
        let float_col: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
        assert_eq!(
            infer_attribute_type(&float_col, "grade").unwrap(),
            AttributeType::Scalar
        );
        let string_col: ArrayRef = Arc::new(StringArray::from(vec!["a"]));
        assert_eq!(
            infer_attribute_type(&string_col, "tag").unwrap(),
            AttributeType::String
        );
    }
}
