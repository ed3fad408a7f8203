//! Drives one finalize event through download, OCR, extraction and persistence.
//!
//! [`AnalysisOrchestrator::handle`] never fails: every error is logged and
//! folded into [`AnalysisOutcome::Dropped`], so the event source sees a
//! normal completion whatever happened and never redelivers.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    models::{analysis::AnalysisDraft, storage_event::StorageObject},
    services::{
        field_extraction::extract_fields,
        ocr_client::{OcrClient, OcrError},
        result_store::{ResultStore, ResultStoreError},
        storage_service::{ObjectSource, StorageError},
    },
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("could not derive a certificate id from `{0}`")]
    InvalidCertificateId(String),
    #[error("download failed: {0}")]
    Download(#[from] StorageError),
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("persisting analysis failed: {0}")]
    Persistence(#[from] ResultStoreError),
}

/// What happened to one event. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Object outside the watched prefix; nothing was done.
    Skipped,
    Persisted { certificate_id: String },
    /// Processing failed; nothing was written.
    Dropped { reason: String },
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    source: Arc<dyn ObjectSource>,
    ocr: OcrClient,
    store: Arc<dyn ResultStore>,
    watch_prefix: String,
}

impl AnalysisOrchestrator {
    pub fn new(
        source: Arc<dyn ObjectSource>,
        ocr: OcrClient,
        store: Arc<dyn ResultStore>,
        watch_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            ocr,
            store,
            watch_prefix: watch_prefix.into(),
        }
    }

    /// Process one finalize event. Always completes.
    pub async fn handle(&self, object: &StorageObject) -> AnalysisOutcome {
        if !object.is_eligible(&self.watch_prefix) {
            debug!(bucket = %object.bucket, name = %object.name, "ignoring object outside watched prefix");
            return AnalysisOutcome::Skipped;
        }

        match self.process(object).await {
            Ok(certificate_id) => {
                info!(
                    bucket = %object.bucket,
                    name = %object.name,
                    certificate_id = %certificate_id,
                    "certificate analysis stored"
                );
                AnalysisOutcome::Persisted { certificate_id }
            }
            Err(err) => {
                let certificate_id = object.certificate_id();
                match &err {
                    AnalysisError::Persistence(_) => error!(
                        bucket = %object.bucket,
                        name = %object.name,
                        certificate_id,
                        error = %err,
                        "certificate analysis dropped"
                    ),
                    _ => warn!(
                        bucket = %object.bucket,
                        name = %object.name,
                        certificate_id,
                        error = %err,
                        "certificate analysis dropped"
                    ),
                }
                AnalysisOutcome::Dropped {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn process(&self, object: &StorageObject) -> Result<String, AnalysisError> {
        let certificate_id = object.certificate_id();
        if certificate_id.is_empty() {
            return Err(AnalysisError::InvalidCertificateId(object.name.clone()));
        }

        let image = self.source.download(&object.bucket, &object.name).await?;
        debug!(name = %object.name, bytes = image.len(), "submitting image for OCR");

        let read = self.ocr.analyze(image).await?;
        let lines = read.response.lines();

        let draft = AnalysisDraft {
            certificate_id: certificate_id.to_string(),
            file_path: object.name.clone(),
            analysis: extract_fields(&lines),
            raw_analysis: read.raw,
        };
        let record = self.store.upsert(draft).await?;

        Ok(record.certificate_id)
    }
}
