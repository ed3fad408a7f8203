//! Health & readiness handlers.
//!
//! - GET /healthz  -> liveness, no I/O
//! - GET /readyz   -> database, analysis table and object directory checks

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`
///
/// 200 when every check passes, 503 otherwise. The body lists each check.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let db = &*state.storage.db;

    let mut checks = BTreeMap::new();
    checks.insert(
        "sqlite",
        CheckStatus::from(
            sqlx::query_scalar::<_, i64>("SELECT 1")
                .fetch_one(db)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        ),
    );
    checks.insert(
        "analyses_table",
        CheckStatus::from(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM certificate_analyses LIMIT 1")
                .fetch_one(db)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        ),
    );
    checks.insert(
        "disk",
        CheckStatus::from(probe_disk(&state.storage.base_path).await),
    );

    let ready = checks.values().all(|check| check.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" },
        checks,
    };
    (status, Json(body))
}

/// Write, read back and remove a scratch file under the storage root.
async fn probe_disk(base: &Path) -> Result<(), String> {
    let probe = base.join(format!(".readyz-{}", Uuid::new_v4()));
    let result = write_and_verify(&probe).await;
    let _ = fs::remove_file(&probe).await;
    result
}

async fn write_and_verify(probe: &Path) -> Result<(), String> {
    fs::write(probe, b"readyz")
        .await
        .map_err(|e| format!("could not write probe file: {}", e))?;
    let read = fs::read(probe)
        .await
        .map_err(|e| format!("could not read probe file: {}", e))?;
    if read != b"readyz" {
        return Err("probe file content mismatch".to_string());
    }
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err(),
        }
    }
}
