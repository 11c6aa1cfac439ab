//! Built-in binding configurations and typed object wrappers.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use serde_json::{json, Value};

use crate::client::{ObjectClient, ObjectRef, TableClient};
use crate::error::{Error, Result};
use crate::feedback::Feedback;
use crate::model::{ModelPath, SchemaModel, SchemaProperty};
use crate::object::TypedObject;
use crate::registry::SchemaRegistry;
use crate::table::TableRef;
use crate::types::{BoundingBox, CoordinateReferenceSystem};

/// Binding configurations for the schemas this crate knows out of the box.
pub const BUILTIN_BINDINGS: &str = r#"{
    "objects/pointset/1.0.0": {
        "values": [
            {"columns": ["x", "y", "z"], "values": "locations.coordinates"}
        ],
        "attributes": "locations.attributes"
    },
    "objects/pointset/2.0.0": {
        "values": [
            {"columns": ["x", "y", "z"], "values": "locations.coordinates"}
        ],
        "attributes": "locations.attributes"
    },
    "objects/triangle-mesh/1.0.0": {
        "values": [
            {"columns": ["x", "y", "z"], "values": "triangles.vertices"}
        ],
        "attributes": "triangles.vertices_attributes"
    },
    "objects/triangle-mesh/2.0.0": {
        "values": [
            {"columns": ["x", "y", "z"], "values": "triangles.vertices"}
        ],
        "attributes": "triangles.vertices_attributes"
    }
}"#;

/// A registry pre-loaded with the built-in binding configurations.
pub fn builtin_registry() -> Result<SchemaRegistry> {
    SchemaRegistry::initialize(&[BUILTIN_BINDINGS])
}

/// The `locations` sub-document of a pointset.
pub struct LocationsModel {
    pub coordinates: SchemaProperty<TableRef>,
}

impl SchemaModel for LocationsModel {
    fn bind(base: &ModelPath, _document: &mut Value) -> Result<Self> {
        Ok(Self {
            coordinates: base.property("coordinates")?,
        })
    }

    fn validate(&self, document: &Value) -> Result<()> {
        if let Some(coordinates) = self.coordinates.get_opt(document)? {
            if coordinates.width != 3 {
                return Err(Error::validation(
                    self.coordinates.source(),
                    format!("coordinates must be 3 columns wide, found {}", coordinates.width),
                ));
            }
        }
        Ok(())
    }
}

/// Typed view over a pointset document.
pub struct PointSetModel {
    pub name: SchemaProperty<String>,
    pub description: SchemaProperty<String>,
    pub bounding_box: SchemaProperty<BoundingBox>,
    pub coordinate_reference_system: SchemaProperty<CoordinateReferenceSystem>,
    pub locations: LocationsModel,
}

impl SchemaModel for PointSetModel {
    fn bind(base: &ModelPath, document: &mut Value) -> Result<Self> {
        Ok(Self {
            name: base.property("name")?,
            description: base.property("description")?,
            bounding_box: base.property("bounding_box")?,
            coordinate_reference_system: base.property("coordinate_reference_system")?,
            locations: base.submodel("locations", document)?,
        })
    }

    fn validate(&self, document: &Value) -> Result<()> {
        self.name.get(document)?;
        if let Some(bounding_box) = self.bounding_box.get_opt(document)? {
            if !bounding_box.is_valid() {
                return Err(Error::validation(
                    self.bounding_box.source(),
                    "bounding box extents are inverted",
                ));
            }
        }
        self.locations.validate(document)
    }
}

/// A pointset object: xyz locations with optional per-point attributes.
pub struct PointSet {
    inner: TypedObject<PointSetModel>,
}

impl std::fmt::Debug for PointSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointSet").finish_non_exhaustive()
    }
}

impl PointSet {
    pub const CLASSIFICATION: &'static str = "objects/pointset";

    /// The document skeleton for a new, empty pointset.
    pub fn new_document(name: &str) -> Value {
        json!({
            "schema": "/objects/pointset/1.0.0/pointset.schema.json",
            "name": name,
            "coordinate_reference_system": "unspecified",
            "locations": {}
        })
    }

    /// Bind an existing pointset document, rejecting other classifications.
    pub fn adapt(
        document: Value,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        let inner = TypedObject::new(document, registry, object_client, table_client)?;
        let classification = &inner.object().schema_id().classification;
        if classification != Self::CLASSIFICATION {
            return Err(Error::ClassificationMismatch {
                expected: Self::CLASSIFICATION.to_string(),
                actual: classification.clone(),
            });
        }
        Ok(Self { inner })
    }

    /// Create a new local pointset with the given name.
    pub fn create(
        name: &str,
        registry: &SchemaRegistry,
        object_client: Arc<dyn ObjectClient>,
        table_client: Arc<dyn TableClient>,
    ) -> Result<Self> {
        Self::adapt(
            Self::new_document(name),
            registry,
            object_client,
            table_client,
        )
    }

    pub fn model(&self) -> &PointSetModel {
        self.inner.model()
    }

    pub fn document(&self) -> &Value {
        self.inner.document()
    }

    pub fn remote(&self) -> Option<&ObjectRef> {
        self.inner.object().remote()
    }

    pub fn bounding_box(&self) -> Result<Option<BoundingBox>> {
        self.inner.model().bounding_box.get_opt(self.document())
    }

    /// Download locations and attributes as one frame.
    pub async fn locations(&self, feedback: &dyn Feedback) -> Result<RecordBatch> {
        self.inner.read_all(None, feedback).await
    }

    /// Upload a locations frame (`x`/`y`/`z` plus attribute columns) and
    /// refresh the stored bounding box from the coordinates.
    pub async fn set_locations(
        &mut self,
        batch: &RecordBatch,
        feedback: &dyn Feedback,
    ) -> Result<()> {
        let bounding_box = BoundingBox::from_coordinates(batch)?;
        self.inner.write_all(batch, feedback).await?;
        let property = self.inner.model().bounding_box.clone();
        property.set(self.inner.object_mut().document_mut(), &bounding_box)?;
        Ok(())
    }

    /// Validate and store the document.
    pub async fn save(&mut self) -> Result<ObjectRef> {
        self.inner.save().await
    }
}
