//! Fetch → scan → cleanup for a single object.
//!
//! [`ScanPipeline::process`] always yields exactly one result and never
//! propagates a failure: whatever goes wrong is folded into an `error`
//! verdict scoped to that object.

use crate::{
    models::scan_result::{FailureKind, ObjectScanResult, ScanVerdict},
    services::{
        fetcher::ObjectFetcher,
        sanitizer::sanitize_key,
        scanner::Scanner,
        workspace::{Workspace, WorkspaceManager},
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

pub struct ScanPipeline {
    fetcher: ObjectFetcher,
    scanner: Arc<dyn Scanner>,
    workspaces: Arc<dyn WorkspaceManager>,
    scan_timeout: Duration,
}

impl ScanPipeline {
    pub fn new(
        fetcher: ObjectFetcher,
        scanner: Arc<dyn Scanner>,
        workspaces: Arc<dyn WorkspaceManager>,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            scanner,
            workspaces,
            scan_timeout,
        }
    }

    pub async fn process(&self, bucket: &str, key: &str) -> ObjectScanResult {
        let workspace = match self.workspaces.acquire().await {
            Ok(ws) => ws,
            Err(err) => {
                let verdict = ScanVerdict::failed(
                    FailureKind::Workspace,
                    format!("could not create workspace: {err}"),
                );
                return log_outcome(bucket, ObjectScanResult::new(key, verdict, None));
            }
        };

        let (verdict, size_mb) = self.run_in(&workspace, bucket, key).await;
        self.workspaces.release(workspace).await;

        log_outcome(bucket, ObjectScanResult::new(key, verdict, size_mb))
    }

    /// Everything that happens while the workspace is held. Returns instead
    /// of bailing so the caller can release unconditionally.
    async fn run_in(
        &self,
        workspace: &Workspace,
        bucket: &str,
        key: &str,
    ) -> (ScanVerdict, Option<f64>) {
        let size_mb = self.fetcher.probe_size(bucket, key).await;
        if self.fetcher.exceeds_limit(size_mb) {
            let reason = format!(
                "exceeds size limit ({:.2} MB > {} MB)",
                size_mb,
                self.fetcher.max_file_size_mb()
            );
            return (ScanVerdict::Skipped { reason }, Some(size_mb));
        }

        debug!(bucket, key, sanitized = %sanitize_key(key), "sanitized object key");

        let local_path = match self.fetcher.fetch(bucket, key, workspace).await {
            Ok(path) => path,
            Err(failure) => return (failure.into(), Some(size_mb)),
        };

        let verdict = self.scanner.scan(&local_path, self.scan_timeout).await;
        (verdict, Some(size_mb))
    }
}

fn log_outcome(bucket: &str, result: ObjectScanResult) -> ObjectScanResult {
    let key = result.key.as_str();
    let status = result.verdict.status();
    match &result.verdict {
        ScanVerdict::Clean => info!(bucket, key, status, "object is clean"),
        ScanVerdict::Infected { signature } => error!(
            bucket,
            key,
            status,
            signature = signature.as_deref().unwrap_or("unknown"),
            "MALWARE DETECTED"
        ),
        ScanVerdict::Error { kind, error } => {
            warn!(bucket, key, status, kind = ?kind, "scan failed: {}", error)
        }
        ScanVerdict::Skipped { reason } => info!(bucket, key, status, "skipped: {}", reason),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{CountingWorkspaces, MemoryStore, ScriptedScanner};
    use tempfile::{TempDir, tempdir};

    struct Harness {
        store: Arc<MemoryStore>,
        scanner: Arc<ScriptedScanner>,
        workspaces: Arc<CountingWorkspaces>,
        pipeline: ScanPipeline,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new("uploads"));
        let scanner = Arc::new(ScriptedScanner::default());
        let workspaces = Arc::new(CountingWorkspaces::new(&dir.path().join("ws")));
        let pipeline = ScanPipeline::new(
            ObjectFetcher::new(store.clone(), 100, Duration::from_secs(5)),
            scanner.clone(),
            workspaces.clone(),
            Duration::from_secs(300),
        );
        Harness {
            store,
            scanner,
            workspaces,
            pipeline,
            _dir: dir,
        }
    }

    impl Harness {
        fn assert_balanced(&self, runs: usize) {
            assert_eq!(self.workspaces.acquired(), runs);
            assert_eq!(self.workspaces.released(), runs);
            assert_eq!(self.workspaces.leftover(), 0);
        }
    }

    #[tokio::test]
    async fn clean_object() {
        let h = harness();
        h.store.put("docs/readme.txt", b"hello world");
        let result = h.pipeline.process("uploads", "docs/readme.txt").await;
        assert_eq!(result.key, "docs/readme.txt");
        assert_eq!(result.verdict, ScanVerdict::Clean);
        assert!(result.size_mb.is_some());
        h.assert_balanced(1);
    }

    #[tokio::test]
    async fn infected_object() {
        let h = harness();
        h.store.put("eicar.txt", b"X5O!P%@AP EICAR-STANDARD-ANTIVIRUS-TEST-FILE");
        let result = h.pipeline.process("uploads", "eicar.txt").await;
        assert!(matches!(result.verdict, ScanVerdict::Infected { .. }));
        h.assert_balanced(1);
    }

    #[tokio::test]
    async fn oversized_object_is_never_downloaded() {
        let h = harness();
        h.store.put_sized("huge.bin", 150 * 1024 * 1024);
        let result = h.pipeline.process("uploads", "huge.bin").await;
        match &result.verdict {
            ScanVerdict::Skipped { reason } => assert!(reason.contains("exceeds size limit")),
            other => panic!("expected skip, got {other:?}"),
        }
        assert_eq!(result.size_mb, Some(150.0));
        assert_eq!(h.store.get_calls(), 0);
        assert_eq!(h.scanner.calls(), 0);
        h.assert_balanced(1);
    }

    #[tokio::test]
    async fn fetch_error_is_isolated() {
        let h = harness();
        h.store.put_vanishing("missing-after-list.txt");
        let result = h.pipeline.process("uploads", "missing-after-list.txt").await;
        match &result.verdict {
            ScanVerdict::Error { kind, error } => {
                assert_eq!(*kind, FailureKind::StorageAccess);
                assert!(error.contains("NoSuchKey"), "{error}");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(h.scanner.calls(), 0);
        h.assert_balanced(1);
    }

    #[tokio::test]
    async fn scan_error_still_releases_workspace() {
        let h = harness();
        h.store.put("slow.iso", b"SLOW");
        h.store.put("broken.iso", b"BROKEN");
        let slow = h.pipeline.process("uploads", "slow.iso").await;
        let broken = h.pipeline.process("uploads", "broken.iso").await;
        assert!(matches!(
            slow.verdict,
            ScanVerdict::Error {
                kind: FailureKind::Timeout,
                ..
            }
        ));
        assert!(matches!(
            broken.verdict,
            ScanVerdict::Error {
                kind: FailureKind::ScannerFailed,
                ..
            }
        ));
        h.assert_balanced(2);
    }

    #[tokio::test]
    async fn hostile_keys_are_scanned_inside_workspace() {
        let h = harness();
        h.store.put("....//etc/passwd", b"root:x:0:0");
        h.store.put("../../../tmp/evil.sh", b"#!/bin/sh");
        for key in ["....//etc/passwd", "../../../tmp/evil.sh"] {
            let result = h.pipeline.process("uploads", key).await;
            assert_eq!(result.verdict, ScanVerdict::Clean, "{key}");
        }
        h.assert_balanced(2);
    }

    #[tokio::test]
    async fn long_key_with_dotted_directory_is_scanned() {
        let h = harness();
        let key = format!("1.2/{}", "x".repeat(251));
        h.store.put(&key, b"benign");
        let result = h.pipeline.process("uploads", &key).await;
        assert_eq!(result.verdict, ScanVerdict::Clean);
        assert_eq!(h.scanner.calls(), 1);
        h.assert_balanced(1);
    }
}
