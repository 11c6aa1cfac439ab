//! Binding for an object's per-row attribute list.
//!
//! Attributes live in the document as a JSON list of records, each naming a
//! stored single-column table. Records carry a generated key that survives
//! value updates, so downstream references stay valid when data changes.

use arrow::record_batch::RecordBatch;
use docpath::PathExpression;
use serde_json::Value;

use diagnostics::{log_debug, log_warn};

use crate::binding::field::read_table;
use crate::client::TableClient;
use crate::error::{Error, Result};
use crate::feedback::{proportional_ranges, Feedback, PartialFeedback};
use crate::frame;
use crate::table::{AttributeRecord, AttributeType, NanDescription};

/// Binds the attribute list at one document location.
#[derive(Debug, Clone)]
pub struct AttributeSetBinding {
    path: PathExpression,
}

impl AttributeSetBinding {
    pub fn new(expression: &str) -> Result<Self> {
        Ok(Self {
            path: PathExpression::compile(expression)?,
        })
    }

    pub fn source(&self) -> &str {
        self.path.source()
    }

    /// All attribute records the document currently declares. An absent
    /// list reads as empty.
    pub fn records(&self, document: &Value) -> Result<Vec<AttributeRecord>> {
        let Some(raw) = self.path.search(document) else {
            return Ok(Vec::new());
        };
        serde_json::from_value(raw)
            .map_err(|err| Error::validation(self.path.source(), err.to_string()))
    }

    /// Records matching a filter predicate, e.g. `attribute_type == 'category'`.
    pub fn filter(&self, document: &Value, predicate: &str) -> Result<Vec<AttributeRecord>> {
        let filter = PathExpression::compile(&format!("[?{predicate}]"))?;
        let raw = self
            .path
            .search(document)
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let kept = filter.search(&raw).unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(kept)
            .map_err(|err| Error::validation(self.path.source(), err.to_string()))
    }

    /// Records selected by key or name, in document order. `None` selects
    /// everything; unknown keys are skipped with a warning.
    pub fn selected(
        &self,
        document: &Value,
        keys: Option<&[String]>,
    ) -> Result<Vec<AttributeRecord>> {
        let records = self.records(document)?;
        let Some(keys) = keys else {
            return Ok(records);
        };
        let mut distinct: Vec<&str> = Vec::new();
        for key in keys {
            if !distinct.contains(&key.as_str()) {
                distinct.push(key);
            }
        }
        let selected: Vec<AttributeRecord> = records
            .into_iter()
            .filter(|record| {
                distinct
                    .iter()
                    .any(|&key| record.key() == key || record.name == key)
            })
            .collect();
        // Warn on distinct requested keys, not raw argument count, so
        // duplicate keys and one key matching several records do not
        // mis-report.
        let matched = distinct
            .iter()
            .filter(|&&key| {
                selected
                    .iter()
                    .any(|record| record.key() == key || record.name == key)
            })
            .count();
        if matched < distinct.len() {
            log_warn!(
                "attribute selection matched {matched} of {requested} keys",
                matched: matched,
                requested: distinct.len()
            );
        }
        Ok(selected)
    }

    /// Download the selected attributes as one frame, columns named by
    /// attribute name in document order. Progress is split equally across
    /// records.
    pub async fn read(
        &self,
        document: &Value,
        client: &dyn TableClient,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        let records = self.selected(document, keys)?;
        let ranges = proportional_ranges(&vec![1; records.len()]);
        let mut parts = Vec::with_capacity(records.len());
        for (record, (start, end)) in records.iter().zip(ranges) {
            let partial = PartialFeedback::new(feedback, start, end);
            parts.push(read_record(record, client, &partial).await?);
        }
        frame::concat_columns(parts)
    }

    /// Append each frame column as a new attribute with a generated key.
    pub async fn append(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        let mut records = self.records(document)?;
        let ranges = proportional_ranges(&vec![1; batch.num_columns()]);
        for (index, (start, end)) in ranges.into_iter().enumerate() {
            let name = batch.schema().field(index).name().clone();
            let column = batch.column(index).clone();
            let attribute_type = frame::infer_attribute_type(&column, &name)?;
            let key = uuid7::uuid7().to_string();
            let partial = PartialFeedback::new(feedback, start, end);
            records.push(
                upload_record(&name, &key, attribute_type, &column, client, &partial).await?,
            );
        }
        self.write_records(document, &records)
    }

    /// Update attributes whose name matches a frame column in place,
    /// keeping their key and declared type; append the rest as new
    /// attributes.
    pub async fn update_or_append(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        let mut records = self.records(document)?;
        let ranges = proportional_ranges(&vec![1; batch.num_columns()]);
        for (index, (start, end)) in ranges.into_iter().enumerate() {
            let name = batch.schema().field(index).name().clone();
            let column = batch.column(index).clone();
            let partial = PartialFeedback::new(feedback, start, end);
            match records.iter_mut().find(|record| record.name == name) {
                Some(existing) => {
                    log_debug!("updating attribute {name}", name: name.as_str());
                    let key = existing.key().to_string();
                    *existing = upload_record(
                        &name,
                        &key,
                        existing.attribute_type,
                        &column,
                        client,
                        &partial,
                    )
                    .await?;
                }
                None => {
                    let attribute_type = frame::infer_attribute_type(&column, &name)?;
                    let key = uuid7::uuid7().to_string();
                    records.push(
                        upload_record(&name, &key, attribute_type, &column, client, &partial)
                            .await?,
                    );
                }
            }
        }
        self.write_records(document, &records)
    }

    /// Discard all existing attributes and append the frame's columns.
    pub async fn replace_all(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        self.write_records(document, &[])?;
        self.append(document, batch, client, feedback).await
    }

    fn write_records(&self, document: &mut Value, records: &[AttributeRecord]) -> Result<()> {
        self.path
            .assign(document, serde_json::to_value(records)?)?;
        Ok(())
    }
}

/// Download one attribute record as a frame named after the attribute.
async fn read_record(
    record: &AttributeRecord,
    client: &dyn TableClient,
    feedback: &dyn Feedback,
) -> Result<RecordBatch> {
    let batch = read_table(
        &record.values,
        record.table.as_ref(),
        record.sentinels(),
        client,
        feedback,
    )
    .await?;
    let names: Vec<String> = if batch.num_columns() == 1 {
        vec![record.name.clone()]
    } else {
        (0..batch.num_columns())
            .map(|i| format!("{}_{i}", record.name))
            .collect()
    };
    frame::rename_columns(&batch, &names, &record.name)
}

/// Upload one column and build its attribute record. Categorical columns
/// are split into a code table and a label lookup.
async fn upload_record(
    name: &str,
    key: &str,
    attribute_type: AttributeType,
    column: &arrow::array::ArrayRef,
    client: &dyn TableClient,
    feedback: &dyn Feedback,
) -> Result<AttributeRecord> {
    let (values, table) = match attribute_type {
        AttributeType::Category => {
            let (codes, labels) = frame::dictionary_encode(column, name)?;
            let codes_frame = frame::single_column_frame(name, std::sync::Arc::new(codes))?;
            let entries: Vec<(i64, String)> = labels
                .into_iter()
                .enumerate()
                .map(|(code, label)| (code as i64, label))
                .collect();
            let values = client
                .upload(&codes_frame, &PartialFeedback::new(feedback, 0.0, 0.8))
                .await?;
            let table = client
                .upload_lookup(&entries, &PartialFeedback::new(feedback, 0.8, 1.0))
                .await?;
            (values, Some(table))
        }
        _ => {
            let values_frame = frame::single_column_frame(name, column.clone())?;
            let values = client.upload(&values_frame, feedback).await?;
            (values, None)
        }
    };

    // Numeric and categorical attributes carry an explicit, initially
    // empty, sentinel list.
    let nan_description = match attribute_type {
        AttributeType::Scalar | AttributeType::Integer | AttributeType::Category => {
            Some(NanDescription::default())
        }
        AttributeType::Bool | AttributeType::String => None,
    };

    Ok(AttributeRecord {
        name: name.to_string(),
        key: Some(key.to_string()),
        attribute_type,
        values,
        table,
        nan_description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NoFeedback;
    use crate::memory::InMemoryTableClient;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use serde_json::json;
    use std::sync::Arc;

    fn grade_frame() -> RecordBatch {
        let column: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5]));
        frame::single_column_frame("grade", column).unwrap()
    }

    #[tokio::test]
    async fn test_append_then_read() {
        let client = InMemoryTableClient::new();
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let mut doc = json!({});

        binding
            .append(&mut doc, &grade_frame(), &client, &NoFeedback)
            .await
            .unwrap();

        let records = binding.records(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "grade");
        assert_eq!(records[0].attribute_type, AttributeType::Scalar);
        assert!(records[0].key.is_some());
        assert_eq!(records[0].nan_description, Some(NanDescription::default()));

        let read = binding
            .read(&doc, &client, None, &NoFeedback)
            .await
            .unwrap();
        assert_eq!(read, grade_frame());
    }

    #[tokio::test]
    async fn test_update_preserves_key_and_type() {
        let client = InMemoryTableClient::new();
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let mut doc = json!({});

        binding
            .append(&mut doc, &grade_frame(), &client, &NoFeedback)
            .await
            .unwrap();
        let original = binding.records(&doc).unwrap()[0].clone();

        let updated_column: ArrayRef = Arc::new(Float64Array::from(vec![9.0, 9.0, 9.0]));
        let updated = frame::single_column_frame("grade", updated_column).unwrap();
        binding
            .update_or_append(&mut doc, &updated, &client, &NoFeedback)
            .await
            .unwrap();

        let records = binding.records(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, original.key);
        assert_eq!(records[0].attribute_type, original.attribute_type);
        assert_ne!(records[0].values.data, original.values.data);
    }

    #[tokio::test]
    async fn test_categorical_attribute_round_trip() {
        let client = InMemoryTableClient::new();
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let mut doc = json!({});

        let column: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "a"]));

        let record = upload_record(
            "zone",
            "k-1",
            AttributeType::Category,
            &column,
            &client,
            &NoFeedback,
        )
        .await
        .unwrap();
        assert!(record.table.is_some());

        binding
            .write_records(&mut doc, &[record])
            .unwrap();
        let read = binding
            .read(&doc, &client, None, &NoFeedback)
            .await
            .unwrap();
        let labels = read
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(labels.value(0), "a");
        assert_eq!(labels.value(1), "b");
        assert_eq!(labels.value(2), "a");
    }

    #[tokio::test]
    async fn test_selection_by_key_or_name() {
        let client = InMemoryTableClient::new();
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let mut doc = json!({});

        let a: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
        let b: ArrayRef = Arc::new(Float64Array::from(vec![2.0]));
        let batch = frame::concat_columns(vec![
            frame::single_column_frame("a", a).unwrap(),
            frame::single_column_frame("b", b).unwrap(),
        ])
        .unwrap();
        binding
            .append(&mut doc, &batch, &client, &NoFeedback)
            .await
            .unwrap();

        let records = binding.records(&doc).unwrap();
        let key_of_b = records[1].key().to_string();

        // Select one by name, one by generated key.
        let selected = binding
            .selected(&doc, Some(&["a".to_string(), key_of_b]))
            .unwrap();
        assert_eq!(selected.len(), 2);

        let by_name = binding.selected(&doc, Some(&["b".to_string()])).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "b");

        // Unknown keys are skipped.
        let none = binding
            .selected(&doc, Some(&["missing".to_string()]))
            .unwrap();
        assert!(none.is_empty());

        // Duplicate keys are deduplicated, not double-selected.
        let deduped = binding
            .selected(&doc, Some(&["a".to_string(), "a".to_string()]))
            .unwrap();
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].name, "a");
    }

    #[tokio::test]
    async fn test_replace_all_discards_previous_records() {
        let client = InMemoryTableClient::new();
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let mut doc = json!({});

        binding
            .append(&mut doc, &grade_frame(), &client, &NoFeedback)
            .await
            .unwrap();

        let replacement: ArrayRef = Arc::new(Float64Array::from(vec![7.0]));
        let batch = frame::single_column_frame("density", replacement).unwrap();
        binding
            .replace_all(&mut doc, &batch, &client, &NoFeedback)
            .await
            .unwrap();

        let records = binding.records(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "density");
    }

    #[test]
    fn test_filter_by_predicate() {
        let binding = AttributeSetBinding::new("locations.attributes").unwrap();
        let doc = json!({"locations": {"attributes": [
            {"name": "grade", "attribute_type": "scalar",
             "values": {"data": "t1", "length": 1, "width": 1, "data_type": "float64"}},
            {"name": "lith", "attribute_type": "category",
             "values": {"data": "t2", "length": 1, "width": 1, "data_type": "int32"},
             "table": {"data": "t3", "length": 1, "data_type": "int32"}}
        ]}});
        let categories = binding
            .filter(&doc, "attribute_type == 'category'")
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "lith");
    }
}
