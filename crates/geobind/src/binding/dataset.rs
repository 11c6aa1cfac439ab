//! The dataset-level binding: every field and attribute location of one
//! schema version, driven from a declarative configuration.

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use diagnostics::log_debug;

use crate::binding::attributes::AttributeSetBinding;
use crate::binding::field::FieldBinding;
use crate::client::TableClient;
use crate::error::{Error, Result};
use crate::feedback::{proportional_ranges, split_feedback, Feedback, PartialFeedback};
use crate::frame;

/// Declarative description of one field binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column names the field contributes to the dataset frame. Empty means
    /// the stored column names pass through unchanged.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Path of the values-table descriptor.
    pub values: String,
    /// Path of the lookup-table descriptor, for categorical fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Path of the sentinel list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nan_values: Option<String>,
}

/// Declarative description of one schema version's dataset binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub values: Vec<FieldSpec>,
    /// Path of the attribute list, when the schema has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

/// All field and attribute bindings for one schema version.
#[derive(Debug, Clone)]
pub struct DatasetBinding {
    fields: Vec<FieldBinding>,
    attributes: Option<AttributeSetBinding>,
}

impl DatasetBinding {
    /// Compile a configuration's path expressions into a usable binding.
    pub fn from_config(config: &BindingConfig) -> Result<Self> {
        let fields = config
            .values
            .iter()
            .map(|spec| {
                FieldBinding::new(
                    spec.columns.clone(),
                    &spec.values,
                    spec.table.as_deref(),
                    spec.nan_values.as_deref(),
                )
            })
            .collect::<Result<Vec<FieldBinding>>>()?;
        let attributes = config
            .attributes
            .as_deref()
            .map(AttributeSetBinding::new)
            .transpose()?;
        Ok(Self { fields, attributes })
    }

    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    pub fn attributes(&self) -> Option<&AttributeSetBinding> {
        self.attributes.as_ref()
    }

    /// The column names claimed by field bindings, in binding order.
    pub fn value_column_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|field| field.column_names().iter().cloned())
            .collect()
    }

    /// Download every field binding into one frame. Progress is weighted by
    /// each field's declared cell count.
    pub async fn read_values(
        &self,
        document: &Value,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        let weights: Vec<u64> = self
            .fields
            .iter()
            .map(|field| field.expected_cells(document))
            .collect();
        let ranges = proportional_ranges(&weights);
        let mut parts = Vec::with_capacity(self.fields.len());
        for (field, (start, end)) in self.fields.iter().zip(ranges) {
            let partial = PartialFeedback::new(feedback, start, end);
            parts.push(field.read(document, client, &partial).await?);
        }
        frame::concat_columns(parts)
    }

    /// Download the selected attributes into one frame. Empty when the
    /// schema has no attribute list.
    pub async fn read_attributes(
        &self,
        document: &Value,
        client: &dyn TableClient,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        match &self.attributes {
            Some(attributes) => attributes.read(document, client, keys, feedback).await,
            None => Ok(frame::empty_frame()),
        }
    }

    /// Download fields and attributes as one frame, fields first.
    pub async fn read_all(
        &self,
        document: &Value,
        client: &dyn TableClient,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        let attribute_count = match &self.attributes {
            Some(attributes) => attributes.selected(document, keys)?.len(),
            None => 0,
        };
        let split = split_feedback(self.fields.len() as u64, attribute_count as u64);

        let values = self
            .read_values(document, client, &PartialFeedback::new(feedback, 0.0, split))
            .await?;
        if attribute_count == 0 {
            return Ok(values);
        }
        let attributes = self
            .read_attributes(
                document,
                client,
                keys,
                &PartialFeedback::new(feedback, split, 1.0),
            )
            .await?;
        frame::concat_columns(vec![values, attributes])
    }

    /// Upload a full dataset frame. Columns claimed by field bindings go to
    /// their fields; any leftovers replace the attribute list. The frame is
    /// partitioned and validated before any transfer starts.
    pub async fn write_all(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        let claimed = self.value_column_names();

        // Validate the partition up front so a malformed frame never
        // results in a half-written document.
        let mut field_frames = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            field_frames.push(frame::select_columns(
                batch,
                field.column_names(),
                field.values_source(),
            )?);
        }
        let leftover_names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .filter(|name| !claimed.contains(name))
            .collect();
        if !leftover_names.is_empty() && self.attributes.is_none() {
            return Err(Error::NoAttributeBinding {
                columns: leftover_names,
            });
        }
        log_debug!(
            "writing dataset: {fields} fields, {extra} attribute columns",
            fields: self.fields.len(),
            extra: leftover_names.len()
        );

        let mut weights: Vec<u64> = field_frames
            .iter()
            .map(|part| (part.num_rows() * part.num_columns()) as u64)
            .collect();
        weights.push((batch.num_rows() * leftover_names.len()) as u64);
        let ranges = proportional_ranges(&weights);

        for ((field, part), (start, end)) in self.fields.iter().zip(&field_frames).zip(&ranges) {
            let partial = PartialFeedback::new(feedback, *start, *end);
            field.write(document, part, client, &partial).await?;
        }

        if !leftover_names.is_empty() {
            let Some(attributes) = &self.attributes else {
                // Checked above.
                return Ok(());
            };
            let extra = frame::select_columns(batch, &leftover_names, attributes.source())?;
            let (start, end) = ranges.last().copied().unwrap_or((0.0, 1.0));
            let partial = PartialFeedback::new(feedback, start, end);
            attributes
                .replace_all(document, &extra, client, &partial)
                .await?;
        } else if let Some(attributes) = &self.attributes {
            // A full write with no attribute columns clears the list.
            attributes
                .replace_all(document, &frame::empty_frame(), client, feedback)
                .await?;
        }
        Ok(())
    }

    /// Update or append attributes from a frame without touching field
    /// bindings or unrelated attributes.
    pub async fn update_attributes(
        &self,
        document: &mut Value,
        batch: &RecordBatch,
        client: &dyn TableClient,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        let Some(attributes) = &self.attributes else {
            let columns = batch
                .schema()
                .fields()
                .iter()
                .map(|field| field.name().clone())
                .collect();
            return Err(Error::NoAttributeBinding { columns });
        };
        attributes
            .update_or_append(document, batch, client, feedback)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NoFeedback;
    use crate::memory::InMemoryTableClient;
    use arrow::array::{ArrayRef, Float64Array};
    use serde_json::json;
    use std::sync::Arc;

    fn pointset_config() -> BindingConfig {
        serde_json::from_value(json!({
            "values": [
                {"columns": ["x", "y", "z"], "values": "locations.coordinates"}
            ],
            "attributes": "locations.attributes"
        }))
        .unwrap()
    }

    fn dataset_frame() -> RecordBatch {
        let columns: Vec<RecordBatch> = [
            ("x", vec![1.0, 2.0]),
            ("y", vec![3.0, 4.0]),
            ("z", vec![5.0, 6.0]),
            ("grade", vec![0.1, 0.2]),
        ]
        .into_iter()
        .map(|(name, values)| {
            let column: ArrayRef = Arc::new(Float64Array::from(values));
            frame::single_column_frame(name, column).unwrap()
        })
        .collect();
        frame::concat_columns(columns).unwrap()
    }

    #[test]
    fn test_config_round_trip() {
        let config = pointset_config();
        assert_eq!(config.values.len(), 1);
        assert_eq!(config.values[0].columns, vec!["x", "y", "z"]);
        assert_eq!(config.attributes.as_deref(), Some("locations.attributes"));

        let binding = DatasetBinding::from_config(&config).unwrap();
        assert_eq!(binding.value_column_names(), vec!["x", "y", "z"]);
        assert!(binding.attributes().is_some());
    }

    #[tokio::test]
    async fn test_write_all_then_read_all() {
        let client = InMemoryTableClient::new();
        let binding = DatasetBinding::from_config(&pointset_config()).unwrap();
        let mut doc = json!({});

        binding
            .write_all(&mut doc, &dataset_frame(), &client, &NoFeedback)
            .await
            .unwrap();

        // Coordinates landed at the field location, grade became an
        // attribute record.
        assert!(doc["locations"]["coordinates"]["data"].is_string());
        assert_eq!(doc["locations"]["attributes"].as_array().unwrap().len(), 1);

        let read = binding
            .read_all(&doc, &client, None, &NoFeedback)
            .await
            .unwrap();
        assert_eq!(read, dataset_frame());
    }

    #[tokio::test]
    async fn test_write_all_missing_field_column_fails_early() {
        let client = InMemoryTableClient::new();
        let binding = DatasetBinding::from_config(&pointset_config()).unwrap();
        let mut doc = json!({});

        let column: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
        let incomplete = frame::single_column_frame("x", column).unwrap();
        let err = binding
            .write_all(&mut doc, &incomplete, &client, &NoFeedback)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
        assert_eq!(doc, json!({}));
    }

    #[tokio::test]
    async fn test_leftover_columns_without_attribute_binding_fail() {
        let client = InMemoryTableClient::new();
        let config: BindingConfig = serde_json::from_value(json!({
            "values": [
                {"columns": ["x", "y", "z"], "values": "locations.coordinates"}
            ]
        }))
        .unwrap();
        let binding = DatasetBinding::from_config(&config).unwrap();
        let mut doc = json!({});

        let err = binding
            .write_all(&mut doc, &dataset_frame(), &client, &NoFeedback)
            .await
            .unwrap_err();
        match err {
            Error::NoAttributeBinding { columns } => {
                assert_eq!(columns, vec!["grade".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_attributes_leaves_fields_alone() {
        let client = InMemoryTableClient::new();
        let binding = DatasetBinding::from_config(&pointset_config()).unwrap();
        let mut doc = json!({});

        binding
            .write_all(&mut doc, &dataset_frame(), &client, &NoFeedback)
            .await
            .unwrap();
        let coordinates_before = doc["locations"]["coordinates"].clone();

        let column: ArrayRef = Arc::new(Float64Array::from(vec![9.0, 8.0]));
        let update = frame::single_column_frame("grade", column).unwrap();
        binding
            .update_attributes(&mut doc, &update, &client, &NoFeedback)
            .await
            .unwrap();

        assert_eq!(doc["locations"]["coordinates"], coordinates_before);
        let read = binding
            .read_attributes(&doc, &client, None, &NoFeedback)
            .await
            .unwrap();
        let grades = read
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(grades.value(0), 9.0);
    }
}
