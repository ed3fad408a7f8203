//! Shared state handed to every HTTP handler.

use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};
use tokio::task::JoinHandle;

use crate::services::{
    events::{FinalizeNotifier, spawn_dispatcher},
    ocr_client::OcrClient,
    orchestrator::AnalysisOrchestrator,
    result_store::{ResultStore, SqliteResultStore},
    storage_service::StorageService,
};

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub orchestrator: AnalysisOrchestrator,
    pub results: Arc<dyn ResultStore>,
    /// Emits a finalize event for every completed upload.
    pub finalize: FinalizeNotifier,
}

impl AppState {
    /// Wire the object store, result store and OCR client together and start
    /// the finalize dispatcher. The handle completes once every clone of the
    /// state has been dropped and in-flight analyses are done.
    pub fn new(
        db: Arc<SqlitePool>,
        storage_dir: impl Into<PathBuf>,
        ocr: OcrClient,
        watch_prefix: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let storage = StorageService::new(db.clone(), storage_dir);
        let results: Arc<dyn ResultStore> = Arc::new(SqliteResultStore::new(db));
        let orchestrator = AnalysisOrchestrator::new(
            Arc::new(storage.clone()),
            ocr,
            results.clone(),
            watch_prefix,
        );
        let (finalize, dispatcher) = spawn_dispatcher(orchestrator.clone());

        let state = Self {
            storage,
            orchestrator,
            results,
            finalize,
        };
        (state, dispatcher)
    }
}
