//! Defines routes for the analysis service.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Analysis endpoints** (bucket names cannot start with `_`)
//!   - `POST   /_analysis/events` - finalize event from an external store
//!   - `GET    /_analysis/certificates/{certificate_id}` - stored analysis
//!
//! - **Object store**
//!   - `PUT    /{bucket}` - create bucket
//!   - `PUT    /{bucket}/{*key}` - upload object (emits a finalize event)
//!   - `GET    /{bucket}/{*key}` - download object
//!   - `HEAD   /{bucket}/{*key}` - retrieve metadata only

use crate::{
    handlers::{
        analysis_handlers::{get_analysis, receive_event},
        health_handlers::{healthz, readyz},
        object_handlers::{create_bucket, get_object, head_object, upload_object},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router; the caller attaches `AppState` with `with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/_analysis/events", post(receive_event))
        .route(
            "/_analysis/certificates/{certificate_id}",
            get(get_analysis),
        )
        .route(
            "/{bucket}/{*key}",
            put(upload_object).get(get_object).head(head_object),
        )
        .route("/{bucket}", put(create_bucket))
}
