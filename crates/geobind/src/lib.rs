//! Client-side binding layer for cloud-stored geoscience objects.
//!
//! An object is a JSON document plus a set of remotely stored columnar
//! tables. This crate maps between the two: binding configurations,
//! resolved per schema version from a [`registry::SchemaRegistry`], declare
//! where in a document each table's descriptor lives; [`binding`] moves
//! Arrow frames through those locations; [`object`] ties a document, its
//! binding, and the service clients together into a full create/fetch/save
//! lifecycle.
//!
//! Path expressions come from the companion `docpath` crate. Logging is
//! opt-in via the `GEOBIND_LOG` environment variable, see the
//! `diagnostics` crate.

pub mod binding;
pub mod client;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod memory;
pub mod model;
pub mod object;
pub mod registry;
pub mod table;
pub mod typed;
pub mod types;

pub use binding::{AttributeSetBinding, BindingConfig, DatasetBinding, FieldBinding, FieldSpec};
pub use client::{ObjectClient, ObjectRef, TableClient};
pub use error::{Error, Result};
pub use feedback::{Feedback, NoFeedback, PartialFeedback};
pub use object::{GeoscienceObject, TypedObject};
pub use registry::{SchemaId, SchemaRegistry, SchemaVersion};
pub use table::{AttributeRecord, AttributeType, LookupRef, NanDescription, Sentinels, TableRef};
pub use typed::{builtin_registry, PointSet, PointSetModel};
