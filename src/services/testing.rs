//! In-memory stand-ins for the pipeline's external collaborators.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use crate::{
    models::analysis::{AnalysisDraft, CertificateAnalysis},
    services::{
        ocr_client::{OcrError, OcrTransport},
        result_store::{ResultStore, ResultStoreError},
        storage_service::{ObjectSource, StorageError, StorageResult},
    },
};

/// Replays canned polling bodies; reports `running` once they run out.
pub struct ScriptedTransport {
    operation_location: Option<String>,
    responses: Mutex<VecDeque<serde_json::Value>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(operation_location: Option<&str>, responses: Vec<serde_json::Value>) -> Self {
        Self {
            operation_location: operation_location.map(str::to_string),
            responses: Mutex::new(responses.into()),
            submitted: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn submitted_images(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched_locations(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrTransport for ScriptedTransport {
    async fn submit(&self, image: Bytes) -> Result<Option<String>, OcrError> {
        self.submitted.lock().unwrap().push(image.to_vec());
        Ok(self.operation_location.clone())
    }

    async fn fetch(&self, operation_location: &str) -> Result<serde_json::Value, OcrError> {
        self.fetched
            .lock()
            .unwrap()
            .push(operation_location.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| serde_json::json!({ "status": "running" })))
    }
}

#[derive(Default)]
pub struct MemoryObjectSource {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    downloads: Mutex<usize>,
}

impl MemoryObjectSource {
    pub fn insert(&self, bucket: &str, name: &str, payload: &[u8]) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), name.to_string()),
            Bytes::copy_from_slice(payload),
        );
    }

    pub fn download_count(&self) -> usize {
        *self.downloads.lock().unwrap()
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectSource {
    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        *self.downloads.lock().unwrap() += 1;
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: name.to_string(),
            })
    }
}

#[derive(Default)]
pub struct MemoryResultStore {
    records: Mutex<HashMap<String, CertificateAnalysis>>,
    writes: Mutex<usize>,
}

impl MemoryResultStore {
    pub fn record(&self, certificate_id: &str) -> Option<CertificateAnalysis> {
        self.records.lock().unwrap().get(certificate_id).cloned()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn upsert(&self, draft: AnalysisDraft) -> Result<CertificateAnalysis, ResultStoreError> {
        let record = draft.stamped(chrono::Utc::now());
        *self.writes.lock().unwrap() += 1;
        self.records
            .lock()
            .unwrap()
            .insert(record.certificate_id.clone(), record.clone());
        Ok(record)
    }

    async fn get(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateAnalysis>, ResultStoreError> {
        Ok(self.record(certificate_id))
    }
}

/// Store whose database is always unavailable.
pub struct FailingStore;

#[async_trait]
impl ResultStore for FailingStore {
    async fn upsert(&self, _draft: AnalysisDraft) -> Result<CertificateAnalysis, ResultStoreError> {
        Err(ResultStoreError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn get(
        &self,
        _certificate_id: &str,
    ) -> Result<Option<CertificateAnalysis>, ResultStoreError> {
        Err(ResultStoreError::Sqlx(sqlx::Error::PoolClosed))
    }
}
