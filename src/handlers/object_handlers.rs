//! HTTP handlers for bucket and object operations.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `StorageService`. Every completed upload is announced as a
//! finalize event.

use crate::{errors::AppError, models::object::Object, state::AppState};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::ReaderStream;

/// Optional request body for `PUT /{bucket}` (create bucket).
#[derive(Debug, Deserialize)]
pub struct CreateBucketReq {
    #[serde(rename = "LocationConstraint")]
    pub location_constraint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBucketResp {
    pub name: String,
    pub region: String,
}

/// Upload an object to `/{bucket}/{*key}`.
pub async fn upload_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let object = state
        .storage
        .upload_object_stream(&bucket, &key, content_type, stream)
        .await?;

    state.finalize.notify(object.finalized_in(&bucket));

    let mut response = Response::new(Body::empty());
    if let Some(value) = quoted_etag(&object) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// Download an object `/{bucket}/{*key}` as a streaming response.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = state.storage.get_object_reader(&bucket, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/{bucket}/{*key}` - same headers as GET but no body.
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let meta = state.storage.get_object_metadata(&bucket, &key).await?;
    let mut response = Response::new(Body::empty());
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// PUT `/{bucket}` - create bucket. The body may be empty.
pub async fn create_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, AppError> {
    let region = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<CreateBucketReq>(&body)
            .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?
            .location_constraint
    };

    let created = state
        .storage
        .create_bucket(&bucket, region.unwrap_or_else(|| "local".into()))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBucketResp {
            name: created.name,
            region: created.region,
        }),
    ))
}

fn quoted_etag(meta: &Object) -> Option<HeaderValue> {
    let etag = meta.etag.as_ref()?;
    HeaderValue::from_str(&format!("\"{}\"", etag)).ok()
}

fn set_object_headers(headers: &mut HeaderMap, meta: &Object) {
    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes.max(0)));

    if let Some(value) = quoted_etag(meta) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
