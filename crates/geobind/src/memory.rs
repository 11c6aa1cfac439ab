//! In-memory client implementations.
//!
//! These back the crate's own tests and let downstream code exercise full
//! object round-trips without a live service. State lives in mutex-guarded
//! maps keyed by generated ids.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::{ObjectClient, ObjectRef, TableClient};
use crate::error::{Error, Result};
use crate::feedback::Feedback;
use crate::frame;
use crate::table::{LookupRef, TableRef};

/// Table storage backed by a process-local map.
#[derive(Default)]
pub struct InMemoryTableClient {
    tables: Mutex<HashMap<String, RecordBatch>>,
    lookups: Mutex<HashMap<String, Vec<(i64, String)>>>,
}

impl InMemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableClient for InMemoryTableClient {
    async fn upload(&self, batch: &RecordBatch, feedback: &dyn Feedback) -> Result<TableRef> {
        let id = uuid7::uuid7().to_string();
        let data_type = batch
            .schema()
            .fields()
            .first()
            .map(|field| frame::encoding_name(field.data_type()))
            .unwrap_or_else(|| "float64".to_string());
        let info = TableRef {
            data: id.clone(),
            length: batch.num_rows() as u64,
            width: batch.num_columns() as u64,
            data_type,
        };
        self.tables.lock().await.insert(id, batch.clone());
        feedback.progress(1.0, Some("upload complete"));
        Ok(info)
    }

    async fn upload_lookup(
        &self,
        entries: &[(i64, String)],
        feedback: &dyn Feedback,
    ) -> Result<LookupRef> {
        let id = uuid7::uuid7().to_string();
        let info = LookupRef {
            data: id.clone(),
            length: entries.len() as u64,
            data_type: "int32".to_string(),
        };
        self.lookups.lock().await.insert(id, entries.to_vec());
        feedback.progress(1.0, Some("upload complete"));
        Ok(info)
    }

    async fn download(&self, table: &TableRef, feedback: &dyn Feedback) -> Result<RecordBatch> {
        let batch = self
            .tables
            .lock()
            .await
            .get(&table.data)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                reference: table.data.clone(),
            })?;
        feedback.progress(1.0, Some("download complete"));
        Ok(batch)
    }

    async fn download_lookup(
        &self,
        table: &LookupRef,
        feedback: &dyn Feedback,
    ) -> Result<Vec<(i64, String)>> {
        let entries = self
            .lookups
            .lock()
            .await
            .get(&table.data)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                reference: table.data.clone(),
            })?;
        feedback.progress(1.0, Some("download complete"));
        Ok(entries)
    }
}

/// Object document storage backed by a process-local map.
#[derive(Default)]
pub struct InMemoryObjectClient {
    objects: Mutex<HashMap<String, (u64, Value)>>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn create(&self, document: &Value) -> Result<ObjectRef> {
        let object_id = uuid7::uuid7().to_string();
        self.objects
            .lock()
            .await
            .insert(object_id.clone(), (1, document.clone()));
        Ok(ObjectRef {
            object_id,
            version_id: "1".to_string(),
        })
    }

    async fn replace(&self, object_id: &str, document: &Value) -> Result<ObjectRef> {
        let mut objects = self.objects.lock().await;
        let entry = objects
            .get_mut(object_id)
            .ok_or_else(|| Error::NotFound {
                reference: object_id.to_string(),
            })?;
        entry.0 += 1;
        entry.1 = document.clone();
        Ok(ObjectRef {
            object_id: object_id.to_string(),
            version_id: entry.0.to_string(),
        })
    }

    async fn fetch(&self, reference: &str) -> Result<(ObjectRef, Value)> {
        let objects = self.objects.lock().await;
        let (version, document) = objects.get(reference).ok_or_else(|| Error::NotFound {
            reference: reference.to_string(),
        })?;
        Ok((
            ObjectRef {
                object_id: reference.to_string(),
                version_id: version.to_string(),
            },
            document.clone(),
        ))
    }
}
