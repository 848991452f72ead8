//! Size-gated download of one object into a workspace.

use crate::{
    models::scan_result::{FailureKind, ScanFailure},
    services::{
        object_store::{ObjectStore, StoreError, bounded},
        sanitizer::{key_extension, resolve_within},
        workspace::Workspace,
    },
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::fs;
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Stem of the downloaded file; the key's extension is appended so the
/// scanner can still apply extension-based heuristics.
const TARGET_STEM: &str = "target";

pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
    max_file_size_mb: f64,
    request_timeout: Duration,
}

impl ObjectFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, max_file_size_mb: u64, request_timeout: Duration) -> Self {
        Self {
            store,
            max_file_size_mb: max_file_size_mb as f64,
            request_timeout,
        }
    }

    /// Reported size of the object in MiB.
    ///
    /// Unreachable metadata is treated as size 0 so scanning is not blocked
    /// by a failed HEAD; the download will surface any real access problem.
    pub async fn probe_size(&self, bucket: &str, key: &str) -> f64 {
        match bounded("head", self.request_timeout, self.store.head(bucket, key)).await {
            Ok(bytes) => bytes as f64 / BYTES_PER_MB,
            Err(err) => {
                warn!(bucket, key, code = err.code(), "size probe failed, assuming 0: {}", err);
                0.0
            }
        }
    }

    pub fn exceeds_limit(&self, size_mb: f64) -> bool {
        size_mb > self.max_file_size_mb
    }

    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size_mb
    }

    /// Download `key` into `workspace` and return the local path.
    ///
    /// The file is named after the extension of the key's last segment only.
    /// After the download the path is canonicalized again and must still be a
    /// regular file inside the workspace.
    pub async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        workspace: &Workspace,
    ) -> Result<PathBuf, ScanFailure> {
        let file_name = format!("{}{}", TARGET_STEM, key_extension(key));
        let local_path = resolve_within(workspace.root(), &file_name).ok_or_else(|| {
            ScanFailure::new(
                FailureKind::SecurityViolation,
                format!("security check failed: `{file_name}` escapes the workspace"),
            )
        })?;

        bounded(
            "get",
            self.request_timeout,
            self.store.get(bucket, key, &local_path),
        )
        .await
        .map_err(storage_failure)?;

        verify_contained(workspace, local_path).await
    }
}

/// Re-resolve the downloaded path from the filesystem and confirm it still
/// lies inside the workspace, defeating symlinks or normalization surprises.
async fn verify_contained(workspace: &Workspace, local_path: PathBuf) -> Result<PathBuf, ScanFailure> {
    let violation = |detail: String| {
        ScanFailure::new(
            FailureKind::SecurityViolation,
            format!("security check failed: {detail}"),
        )
    };

    let resolved = fs::canonicalize(&local_path)
        .await
        .map_err(|err| violation(format!("downloaded file missing: {err}")))?;
    if !resolved.starts_with(workspace.root()) {
        return Err(violation(format!(
            "{} resolves outside the workspace",
            local_path.display()
        )));
    }
    let meta = fs::metadata(&resolved)
        .await
        .map_err(|err| violation(format!("downloaded file unreadable: {err}")))?;
    if !meta.is_file() {
        return Err(violation("downloaded path is not a regular file".into()));
    }
    Ok(resolved)
}

pub fn storage_failure(err: StoreError) -> ScanFailure {
    ScanFailure::new(
        FailureKind::StorageAccess,
        format!("storage access failed ({}): {}", err.code(), err),
    )
}
