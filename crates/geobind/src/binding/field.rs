//! Binding between one document field and its stored table.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use docpath::PathExpression;
use serde_json::Value;

use diagnostics::log_debug;

use crate::client::TableClient;
use crate::error::{Error, Result};
use crate::feedback::{split_feedback, Feedback, PartialFeedback};
use crate::frame;
use crate::table::{LookupRef, Sentinels, TableRef};

/// Binds a group of frame columns to one values-table location in a
/// document, with optional lookup-table and sentinel locations alongside.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    column_names: Vec<String>,
    values_path: PathExpression,
    table_path: Option<PathExpression>,
    nan_path: Option<PathExpression>,
}

impl FieldBinding {
    pub fn new(
        column_names: Vec<String>,
        values: &str,
        table: Option<&str>,
        nan_values: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            column_names,
            values_path: PathExpression::compile(values)?,
            table_path: table.map(PathExpression::compile).transpose()?,
            nan_path: nan_values.map(PathExpression::compile).transpose()?,
        })
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn values_source(&self) -> &str {
        self.values_path.source()
    }

    /// The values-table descriptor the document currently declares.
    pub fn values_ref(&self, document: &Value) -> Result<TableRef> {
        let raw = self.values_path.search(document).ok_or_else(|| {
            Error::validation(self.values_path.source(), "values table is not present")
        })?;
        serde_json::from_value(raw)
            .map_err(|err| Error::validation(self.values_path.source(), err.to_string()))
    }

    /// The lookup-table descriptor, when the binding has one and the
    /// document declares it.
    pub fn lookup_ref(&self, document: &Value) -> Result<Option<LookupRef>> {
        let Some(path) = &self.table_path else {
            return Ok(None);
        };
        let Some(raw) = path.search(document) else {
            return Ok(None);
        };
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|err| Error::validation(path.source(), err.to_string()))
    }

    /// The sentinel values declared at the nan location, if any.
    pub fn sentinels(&self, document: &Value) -> Result<Option<Sentinels>> {
        let Some(path) = &self.nan_path else {
            return Ok(None);
        };
        let Some(raw) = path.search(document) else {
            return Ok(None);
        };
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|err| Error::validation(path.source(), err.to_string()))
    }

    /// Total cells this binding would transfer on a read, used to weight
    /// progress reporting. Zero when the document does not declare the
    /// tables yet.
    pub fn expected_cells(&self, document: &Value) -> u64 {
        let values = self.values_ref(document).map(|t| t.cells()).unwrap_or(0);
        let lookup = self
            .lookup_ref(document)
            .ok()
            .flatten()
            .map(|t| t.cells())
            .unwrap_or(0);
        values + lookup
    }

    /// Download this binding's data as a frame with the configured column
    /// names. Categorical codes are decoded to labels and sentinels are
    /// masked to nulls.
    pub async fn read(
        &self,
        document: &Value,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        let values = self.values_ref(document)?;
        let lookup = self.lookup_ref(document)?;
        let sentinels = self.sentinels(document)?;
        log_debug!("reading field {path}", path: self.values_path.source());
        let batch = read_table(&values, lookup.as_ref(), sentinels.as_ref(), client, feedback)
            .await?;
        if self.column_names.is_empty() {
            Ok(batch)
        } else {
            frame::rename_columns(&batch, &self.column_names, self.values_path.source())
        }
    }

    /// Upload a frame and write the resulting descriptors back into the
    /// document. The frame must carry exactly the configured columns. The
    /// frame is validated before any transfer starts.
    pub async fn write(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        if !self.column_names.is_empty() && batch.num_columns() != self.column_names.len() {
            return Err(Error::ColumnCountMismatch {
                context: self.values_path.source().to_string(),
                expected: self.column_names.len(),
                actual: batch.num_columns(),
            });
        }

        if let Some(table_path) = &self.table_path {
            // Categorical storage: codes go to the values table, labels to
            // the lookup table.
            let (name, column) = frame::single_column(batch, self.values_path.source())?;
            let (codes, labels) = frame::dictionary_encode(&column, &name)?;
            let codes_frame = frame::single_column_frame(&name, std::sync::Arc::new(codes))?;

            let split = split_feedback(codes_frame.num_rows() as u64, labels.len() as u64 * 2);
            let values_info = client
                .upload(&codes_frame, &PartialFeedback::new(feedback, 0.0, split))
                .await?;
            let entries: Vec<(i64, String)> = labels
                .into_iter()
                .enumerate()
                .map(|(code, label)| (code as i64, label))
                .collect();
            let lookup_info = client
                .upload_lookup(&entries, &PartialFeedback::new(feedback, split, 1.0))
                .await?;

            self.values_path
                .assign(document, serde_json::to_value(values_info)?)?;
            table_path.assign(document, serde_json::to_value(lookup_info)?)?;
        } else {
            let values_info = client.upload(batch, feedback).await?;
            self.values_path
                .assign(document, serde_json::to_value(values_info)?)?;
        }
        Ok(())
    }
}

/// Download a values table plus optional lookup decode and sentinel
/// masking. Shared by field and attribute reads. Progress is split between
/// the two transfers in proportion to their cell counts.
pub(crate) async fn read_table(
    values: &TableRef,
    lookup: Option<&LookupRef>,
    sentinels: Option<&Sentinels>,
    client: &dyn TableClient,
    feedback: &dyn Feedback,
) -> Result<RecordBatch> {
    let lookup = lookup.filter(|info| info.length > 0);
    let split = match lookup {
        Some(info) => split_feedback(values.cells(), info.cells()),
        None => 1.0,
    };

    let mut batch = client
        .download(values, &PartialFeedback::new(feedback, 0.0, split))
        .await?;

    if let Some(info) = lookup {
        let entries = client
            .download_lookup(info, &PartialFeedback::new(feedback, split, 1.0))
            .await?;
        let mapping: HashMap<i64, String> = entries.into_iter().collect();
        batch = map_columns(&batch, |name, column| {
            frame::decode_lookup(column, &mapping, name)
        })?;
    }

    if let Some(sentinels) = sentinels.filter(|s| !s.is_empty()) {
        batch = map_columns(&batch, |name, column| {
            frame::mask_sentinels(column, sentinels, name)
        })?;
    }

    Ok(batch)
}

fn map_columns<F>(batch: &RecordBatch, mut transform: F) -> Result<RecordBatch>
where
    F: FnMut(&str, &arrow::array::ArrayRef) -> Result<arrow::array::ArrayRef>,
{
    let mut parts = Vec::with_capacity(batch.num_columns());
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        let transformed = transform(field.name(), column)?;
        parts.push(frame::single_column_frame(field.name(), transformed)?);
    }
    frame::concat_columns(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NoFeedback;
    use crate::memory::InMemoryTableClient;
    use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
    use serde_json::json;
    use std::sync::Arc;

    fn xy_frame() -> RecordBatch {
        let x: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0]));
        let y: ArrayRef = Arc::new(Float64Array::from(vec![3.0, 4.0]));
        frame::concat_columns(vec![
            frame::single_column_frame("x", x).unwrap(),
            frame::single_column_frame("y", y).unwrap(),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_plain_field() {
        let client = InMemoryTableClient::new();
        let binding = FieldBinding::new(
            vec!["x".to_string(), "y".to_string()],
            "geometry.coordinates",
            None,
            None,
        )
        .unwrap();

        let mut doc = json!({});
        binding
            .write(&mut doc, &xy_frame(), &client, &NoFeedback)
            .await
            .unwrap();

        // The descriptor landed at the configured location.
        let info = binding.values_ref(&doc).unwrap();
        assert_eq!(info.length, 2);
        assert_eq!(info.width, 2);
        assert_eq!(binding.expected_cells(&doc), 4);

        let read = binding.read(&doc, &client, &NoFeedback).await.unwrap();
        assert_eq!(read, xy_frame());
    }

    #[tokio::test]
    async fn test_categorical_write_then_read() {
        let client = InMemoryTableClient::new();
        let binding = FieldBinding::new(
            vec!["lith".to_string()],
            "lith.values",
            Some("lith.table"),
            None,
        )
        .unwrap();

        let column: ArrayRef = Arc::new(StringArray::from(vec![
            Some("granite"),
            Some("schist"),
            Some("granite"),
        ]));
        let labels = frame::single_column_frame("lith", column.clone()).unwrap();

        let mut doc = json!({});
        binding
            .write(&mut doc, &labels, &client, &NoFeedback)
            .await
            .unwrap();

        let lookup = binding.lookup_ref(&doc).unwrap().unwrap();
        assert_eq!(lookup.length, 2);

        let read = binding.read(&doc, &client, &NoFeedback).await.unwrap();
        let read_col = read
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(read_col.value(0), "granite");
        assert_eq!(read_col.value(1), "schist");
        assert_eq!(read_col.value(2), "granite");
    }

    #[tokio::test]
    async fn test_read_masks_sentinels() {
        let client = InMemoryTableClient::new();
        let binding = FieldBinding::new(
            vec!["grade".to_string()],
            "grade.values",
            None,
            Some("grade.nan_description.values"),
        )
        .unwrap();

        let column: ArrayRef = Arc::new(Float64Array::from(vec![0.5, -9999.0, 1.5]));
        let grades = frame::single_column_frame("grade", column).unwrap();

        let mut doc = json!({"grade": {"nan_description": {"values": [-9999.0]}}});
        binding
            .write(&mut doc, &grades, &client, &NoFeedback)
            .await
            .unwrap();

        let read = binding.read(&doc, &client, &NoFeedback).await.unwrap();
        let read_col = read
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(read_col.value(0), 0.5);
        assert!(read_col.is_null(1));
        assert_eq!(read_col.value(2), 1.5);
    }

    #[tokio::test]
    async fn test_write_rejects_wrong_column_count_before_upload() {
        let client = InMemoryTableClient::new();
        let binding =
            FieldBinding::new(vec!["x".to_string()], "geometry.coordinates", None, None).unwrap();

        let mut doc = json!({});
        let err = binding
            .write(&mut doc, &xy_frame(), &client, &NoFeedback)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ColumnCountMismatch { .. }));
        // Nothing was written into the document.
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn test_values_ref_missing_is_validation_error() {
        let binding = FieldBinding::new(Vec::new(), "geometry.coordinates", None, None).unwrap();
        let err = binding.values_ref(&json!({})).unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }
}
