//! Object lifecycle: a document, its resolved binding, and the clients
//! that move its data.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use serde_json::Value;

use diagnostics::{log_debug, log_info};

use crate::binding::DatasetBinding;
use crate::client::{ObjectClient, ObjectRef, TableClient};
use crate::error::{Error, Result};
use crate::feedback::Feedback;
use crate::model::{ModelPath, SchemaModel};
use crate::registry::{SchemaId, SchemaRegistry};

/// The document key that declares which schema an object conforms to.
const SCHEMA_KEY: &str = "schema";

fn declared_schema(document: &Value) -> Result<SchemaId> {
    let raw = document
        .get(SCHEMA_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation(SCHEMA_KEY, "document does not declare a schema"))?;
    SchemaId::parse(raw)
}

/// A geoscience object: its JSON document plus everything needed to move
/// its tabular data. The document is the single source of truth; tabular
/// reads and writes go through the binding resolved from its declared
/// schema.
pub struct GeoscienceObject {
    document: Value,
    schema_id: SchemaId,
    binding: Arc<DatasetBinding>,
    object_client: Arc<dyn ObjectClient>,
    table_client: Arc<dyn TableClient>,
    remote: Option<ObjectRef>,
}

impl GeoscienceObject {
    /// Wrap a local document that has not been stored yet.
    pub fn new(
        document: Value,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        let schema_id = declared_schema(&document)?;
        let binding = registry.resolve(&schema_id)?;
        log_debug!("bound object to schema {id}", id: schema_id.to_string());
        Ok(Self {
            document,
            schema_id,
            binding,
            object_client,
            table_client,
            remote: None,
        })
    }

    /// Retrieve a stored object and bind it.
    pub async fn fetch(
        reference: &str,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        let (remote, document) = object_client.fetch(reference).await?;
        let mut object = Self::new(document, registry, object_client, table_client)?;
        object.remote = Some(remote);
        Ok(object)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Value {
        &mut self.document
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }

    pub fn binding(&self) -> &DatasetBinding {
        &self.binding
    }

    /// The stored identity, once the object has been saved or fetched.
    pub fn remote(&self) -> Option<&ObjectRef> {
        self.remote.as_ref()
    }

    /// Store the current document: create on first save, replace after.
    pub async fn save(&mut self) -> Result<ObjectRef> {
        let result = match &self.remote {
            None => self.object_client.create(&self.document).await?,
            Some(existing) => {
                self.object_client
                    .replace(&existing.object_id, &self.document)
                    .await?
            }
        };
        log_info!(
            "saved object {id} version {version}",
            id: result.object_id.as_str(),
            version: result.version_id.as_str()
        );
        self.remote = Some(result.clone());
        Ok(result)
    }

    pub async fn read_values(&self, feedback: &dyn Feedback) -> Result<RecordBatch> {
        self.binding
            .read_values(&self.document, self.table_client.as_ref(), feedback)
            .await
    }

    pub async fn read_attributes(
        &self,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        self.binding
            .read_attributes(&self.document, self.table_client.as_ref(), keys, feedback)
            .await
    }

    pub async fn read_all(
        &self,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        self.binding
            .read_all(&self.document, self.table_client.as_ref(), keys, feedback)
            .await
    }

    /// Upload a full dataset frame and update the document's descriptors.
    /// The document changes locally; call [`save`](Self::save) to store it.
    pub async fn write_all(
        &mut self,
        batch: &RecordBatch,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        self.binding
            .write_all(&mut self.document, batch, self.table_client.as_ref(), feedback)
            .await
    }

    /// Update or append attributes without touching field data.
    pub async fn update_attributes(
        &mut self,
        batch: &RecordBatch,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        self.binding
            .update_attributes(&mut self.document, batch, self.table_client.as_ref(), feedback)
            .await
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        set_top_level(&mut self.document, "name", Value::String(name.to_string()))
    }

    pub fn description(&self) -> Option<&str> {
        self.document.get("description").and_then(Value::as_str)
    }

    pub fn set_description(&mut self, description: &str) -> Result<()> {
        set_top_level(
            &mut self.document,
            "description",
            Value::String(description.to_string()),
        )
    }

    pub fn tags(&self) -> Vec<String> {
        self.document
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_tags(&mut self, tags: &[String]) -> Result<()> {
        let raw = Value::Array(tags.iter().cloned().map(Value::String).collect());
        set_top_level(&mut self.document, "tags", raw)
    }
}

fn set_top_level(document: &mut Value, key: &str, value: Value) -> Result<()> {
    let map = document
        .as_object_mut()
        .ok_or_else(|| Error::validation(key, "document root is not a map"))?;
    map.insert(key.to_string(), value);
    Ok(())
}

/// A [`GeoscienceObject`] paired with a bound [`SchemaModel`]. The model is
/// rebuilt after any operation that rewrites the document, so its accessors
/// always reflect current state.
pub struct TypedObject<M: SchemaModel> {
    inner: GeoscienceObject,
    model: M,
}

impl<M: SchemaModel> TypedObject<M> {
    pub fn new(
        document: Value,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        let mut inner = GeoscienceObject::new(document, registry, object_client, table_client)?;
        let model = M::bind(&ModelPath::root(), inner.document_mut())?;
        Ok(Self { inner, model })
    }

    pub async fn fetch(
        reference: &str,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        let mut inner =
            GeoscienceObject::fetch(reference, registry, object_client, table_client).await?;
        let model = M::bind(&ModelPath::root(), inner.document_mut())?;
        Ok(Self { inner, model })
    }

    pub fn object(&self) -> &GeoscienceObject {
        &self.inner
    }

    pub fn object_mut(&mut self) -> &mut GeoscienceObject {
        &mut self.inner
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn document(&self) -> &Value {
        self.inner.document()
    }

    pub fn rebuild(&mut self) -> Result<()> {
        self.model = M::bind(&ModelPath::root(), self.inner.document_mut())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate(self.inner.document())
    }

    pub async fn save(&mut self) -> Result<ObjectRef> {
        self.validate()?;
        let result = self.inner.save().await?;
        self.rebuild()?;
        Ok(result)
    }

    pub async fn write_all(
        &mut self,
        batch: &RecordBatch,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        self.inner.write_all(batch, feedback).await?;
        self.rebuild()
    }

    pub async fn read_all(
        &self,
        keys: Option<&[String]>,
        feedback: &dyn Feedback,
    ) -> Result<RecordBatch> {
        self.inner.read_all(keys, feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_schema() {
        let doc = json!({"schema": "/objects/pointset/1.0.0/pointset.schema.json"});
        let id = declared_schema(&doc).unwrap();
        assert_eq!(id.to_string(), "objects/pointset/1.0.0");

        let err = declared_schema(&json!({})).unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }
}
