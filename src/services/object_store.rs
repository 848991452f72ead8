//! The object store as seen by the scanner: list, head, get.
//!
//! Backends implement [`ObjectStore`]; the orchestrator never knows which one
//! it is talking to. [`list_all_keys`] turns the paged listing into one
//! ordered key sequence.

use async_trait::async_trait;
use std::{future::Future, io, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    /// S3-style error code, stable across backends.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BucketNotFound(_) => "NoSuchBucket",
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::ObjectNotFound { .. } => "NoSuchKey",
            Self::InvalidObjectKey => "InvalidObjectKey",
            Self::Timeout { .. } => "RequestTimeout",
            Self::Sqlx(_) | Self::Io(_) => "InternalError",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a bucket listing.
#[derive(Debug, Default, Clone)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys, starting after `continuation_token`.
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage>;

    /// Size in bytes of a live object.
    async fn head(&self, bucket: &str, key: &str) -> StoreResult<u64>;

    /// Copy an object's payload to `local_path`.
    async fn get(&self, bucket: &str, key: &str, local_path: &Path) -> StoreResult<()>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Follow continuation tokens until the listing is exhausted.
///
/// Any page failing fails the whole listing; partial key sets are never
/// returned.
pub async fn list_all_keys(
    store: &dyn ObjectStore,
    bucket: &str,
    request_timeout: Duration,
) -> StoreResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = bounded(
            "list",
            request_timeout,
            store.list_page(bucket, token.as_deref()),
        )
        .await?;
        pages += 1;
        keys.extend(page.keys);
        match page.next_token {
            // A backend echoing the same token would loop forever.
            Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
            _ => break,
        }
    }
    tracing::debug!(bucket, pages, keys = keys.len(), "listing complete");
    Ok(keys)
}

/// Run a store request with an upper bound on its duration.
pub async fn bounded<T, F>(operation: &'static str, after: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, after }),
    }
}
