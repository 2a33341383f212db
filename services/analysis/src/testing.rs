//! In-memory stores for exercising the pipeline without AWS.

use crate::analysis_store::{AnalysisRecord, AnalysisStore, PersistenceError};
use crate::document_store::{DocumentStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Document store holding objects in a map
#[derive(Default)]
pub struct InMemoryDocumentStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_reads: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_object(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().await.insert(key.to_string(), data.into());
    }

    /// Make every subsequent read fail with a non-404 error
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Fetch {
                key: key.to_string(),
                message: "access denied".to_string(),
            });
        }

        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

/// Analysis store holding records in a map
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    records: Mutex<HashMap<(String, String), AnalysisRecord>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn put(&self, record: &AnalysisRecord) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write(
                "ResourceNotFoundException: table not found".to_string(),
            ));
        }

        self.records.lock().await.insert(
            (record.user_id.clone(), record.document_id.clone()),
            record.clone(),
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisRecord>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&(user_id.to_string(), document_id.to_string()))
            .cloned())
    }
}
