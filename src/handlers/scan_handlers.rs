//! HTTP handlers that trigger invocations.
//! Every handler answers with the invocation's `ScanSummary`; only requests
//! that are malformed before any scanning starts produce an `AppError`.

use crate::{
    errors::AppError,
    handlers::AppState,
    models::{event::InvocationEvent, summary::ScanSummary},
    services::sqlite_store::validate_bucket_name,
};
use axum::{
    Json,
    extract::{Path, State},
};

/// `POST /invoke` — body is an invocation event (notification or batch).
pub async fn invoke(
    State(state): State<AppState>,
    Json(event): Json<InvocationEvent>,
) -> Json<ScanSummary> {
    Json(state.invoker.invoke(&event).await)
}

/// `POST /scan/{bucket}` — batch-scan a bucket.
pub async fn scan_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<Json<ScanSummary>, AppError> {
    checked_bucket(&bucket)?;
    let event = InvocationEvent::batch(bucket);
    Ok(Json(state.invoker.invoke(&event).await))
}

/// `POST /scan/{bucket}/{*key}` — scan one object, as an upload notification
/// would.
pub async fn scan_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<ScanSummary>, AppError> {
    checked_bucket(&bucket)?;
    if key.is_empty() {
        return Err(AppError::bad_request("object key must not be empty"));
    }
    let event = InvocationEvent::single(bucket, key);
    Ok(Json(state.invoker.invoke(&event).await))
}

fn checked_bucket(bucket: &str) -> Result<(), AppError> {
    validate_bucket_name(bucket).map_err(|err| AppError::bad_request(err.to_string()))
}
