//! Analysis endpoints.
//!
//! - POST /_analysis/events                         -> finalize event from an external store
//! - GET  /_analysis/certificates/{certificate_id}  -> persisted analysis

use crate::{errors::AppError, models::storage_event::StorageObject, state::AppState};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

/// `POST /_analysis/events`
///
/// Runs the pipeline for one finalize notification and answers `202` no
/// matter what happened, including unreadable payloads, so the sender never
/// retries.
pub async fn receive_event(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<StorageObject>(&body) {
        Ok(object) => {
            state.orchestrator.handle(&object).await;
        }
        Err(err) => warn!("ignoring malformed finalize event: {}", err),
    }
    StatusCode::ACCEPTED
}

/// `GET /_analysis/certificates/{certificate_id}`
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .results
        .get(&certificate_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no analysis for `{}`", certificate_id)))
}
