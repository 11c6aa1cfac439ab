//! Service abstraction the binding layer is written against.
//!
//! Two narrow traits cover everything the crate needs from the remote
//! service: bulk table transfer and object document storage. Production
//! transports and the in-memory doubles used in tests implement the same
//! traits.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::feedback::Feedback;
use crate::table::{LookupRef, TableRef};

/// Identifies one stored version of an object document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub object_id: String,
    pub version_id: String,
}

/// Bulk transfer of columnar tables.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Store a frame, returning the descriptor to embed in a document.
    async fn upload(&self, batch: &RecordBatch, feedback: &dyn Feedback) -> Result<TableRef>;

    /// Store a code-to-label lookup table.
    async fn upload_lookup(
        &self,
        entries: &[(i64, String)],
        feedback: &dyn Feedback,
    ) -> Result<LookupRef>;

    /// Retrieve a previously stored frame.
    async fn download(&self, table: &TableRef, feedback: &dyn Feedback) -> Result<RecordBatch>;

    /// Retrieve a previously stored lookup table.
    async fn download_lookup(
        &self,
        table: &LookupRef,
        feedback: &dyn Feedback,
    ) -> Result<Vec<(i64, String)>>;
}

/// Storage for object documents.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Store a new document, returning its assigned identity.
    async fn create(&self, document: &Value) -> Result<ObjectRef>;

    /// Store a new version of an existing document.
    async fn replace(&self, object_id: &str, document: &Value) -> Result<ObjectRef>;

    /// Retrieve the latest version of a document by object id.
    async fn fetch(&self, reference: &str) -> Result<(ObjectRef, Value)>;
}
