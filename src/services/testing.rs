//! Test doubles shared by the service tests.

use crate::{
    models::scan_result::{FailureKind, ScanVerdict},
    services::{
        object_store::{ListPage, ObjectStore, StoreError, StoreResult},
        scanner::Scanner,
        workspace::{TempWorkspaceManager, Workspace, WorkspaceManager},
    },
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

struct Entry {
    data: Vec<u8>,
    size: u64,
}

/// Single-bucket in-memory store that counts calls.
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, Entry>>,
    vanished: Mutex<BTreeSet<String>>,
    page_size: usize,
    fail_listing: bool,
    list_calls: AtomicUsize,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            vanished: Mutex::new(BTreeSet::new()),
            page_size: 1000,
            fail_listing: false,
            list_calls: AtomicUsize::new(0),
            head_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Every listing request fails, as if the store were down.
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Entry {
                data: data.to_vec(),
                size: data.len() as u64,
            },
        );
    }

    /// Object whose reported size is `size` but whose body is empty.
    pub fn put_sized(&self, key: &str, size: u64) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Entry {
                data: Vec::new(),
                size,
            },
        );
    }

    /// Listed, but deleted before anyone can HEAD or GET it.
    pub fn put_vanishing(&self, key: &str) {
        self.put(key, b"");
        self.vanished.lock().unwrap().insert(key.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check_bucket(&self, bucket: &str) -> StoreResult<()> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound(bucket.to_string()))
        }
    }

    fn not_found(&self, key: &str) -> StoreError {
        StoreError::ObjectNotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(StoreError::Io(io::Error::other("connection refused")));
        }
        self.check_bucket(bucket)?;
        let objects = self.objects.lock().unwrap();
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| continuation_token.is_none_or(|t| k.as_str() > t))
            .take(self.page_size + 1)
            .cloned()
            .collect();
        let next_token = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };
        Ok(ListPage { keys, next_token })
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<u64> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.check_bucket(bucket)?;
        if self.vanished.lock().unwrap().contains(key) {
            return Err(self.not_found(key));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.size)
            .ok_or_else(|| self.not_found(key))
    }

    async fn get(&self, bucket: &str, key: &str, local_path: &Path) -> StoreResult<()> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_bucket(bucket)?;
        if self.vanished.lock().unwrap().contains(key) {
            return Err(self.not_found(key));
        }
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| self.not_found(key))?;
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }
}

/// Decides by file content: `EICAR` → infected, `SLOW` → timeout,
/// `BROKEN` → scanner failure, anything else → clean.
#[derive(Default)]
pub struct ScriptedScanner {
    calls: AtomicUsize,
}

impl ScriptedScanner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = match tokio::fs::read(path).await {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(err) => return ScanVerdict::failed(FailureKind::ScannerFailed, err.to_string()),
        };
        if body.contains("EICAR") {
            ScanVerdict::Infected {
                signature: Some("Eicar-Test-Signature".into()),
            }
        } else if body.contains("SLOW") {
            ScanVerdict::failed(
                FailureKind::Timeout,
                format!("scan timeout after {}s", timeout.as_secs_f64()),
            )
        } else if body.contains("BROKEN") {
            ScanVerdict::failed(FailureKind::ScannerFailed, "scanner failed (exit code 2)")
        } else {
            ScanVerdict::Clean
        }
    }
}

/// Real temp workspaces, with acquire/release counted.
pub struct CountingWorkspaces {
    base: PathBuf,
    inner: TempWorkspaceManager,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingWorkspaces {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            inner: TempWorkspaceManager::new(base),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Workspaces still present on disk.
    pub fn leftover(&self) -> usize {
        std::fs::read_dir(&self.base)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl WorkspaceManager for CountingWorkspaces {
    async fn acquire(&self) -> io::Result<Workspace> {
        let ws = self.inner.acquire().await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(ws)
    }

    async fn release(&self, workspace: Workspace) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(workspace).await;
    }
}
