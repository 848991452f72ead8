use crate::services::object_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Faults that abort a whole invocation. Per-object faults never end up
/// here; they become `error` results instead.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// No notification records and no bucket configured or requested.
    #[error("no bucket specified")]
    NoBucket,
    /// The bucket could not be enumerated.
    #[error("failed to list bucket `{bucket}` ({}): {source}", .source.code())]
    Enumeration {
        bucket: String,
        #[source]
        source: StoreError,
    },
}

/// A lightweight HTTP error that renders as `{error, status}` JSON.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}
