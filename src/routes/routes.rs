//! Defines routes for triggering scans.
//!
//! ## Structure
//! - `POST /invoke`               — invocation event (notification records or batch)
//! - `POST /scan/{bucket}`        — batch-scan a whole bucket
//! - `POST /scan/{bucket}/{*key}` — scan a single object
//! - `GET  /healthz`, `GET /readyz`
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::handlers::{
    AppState,
    health_handlers::{healthz, readyz},
    scan_handlers::{invoke, scan_bucket, scan_object},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. Handlers share [`AppState`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/invoke", post(invoke))
        .route("/scan/{bucket}/{*key}", post(scan_object))
        .route("/scan/{bucket}", post(scan_bucket))
}
