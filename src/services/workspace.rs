//! Disposable per-object scratch directories.
//!
//! Every pipeline run acquires exactly one [`Workspace`] and hands it back to
//! [`WorkspaceManager::release`] on every exit path. Release never fails from
//! the caller's point of view: problems are logged and swallowed so cleanup
//! can't mask the scan result.

use async_trait::async_trait;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// An empty, uniquely named directory owned by a single pipeline run.
///
/// Deliberately not `Clone`: releasing consumes it.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Canonical path of the workspace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    async fn acquire(&self) -> io::Result<Workspace>;
    async fn release(&self, workspace: Workspace);
}

/// Creates workspaces as `scan-<uuid>` directories beneath a base directory.
#[derive(Debug, Clone)]
pub struct TempWorkspaceManager {
    base: PathBuf,
}

impl TempWorkspaceManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl WorkspaceManager for TempWorkspaceManager {
    async fn acquire(&self) -> io::Result<Workspace> {
        fs::create_dir_all(&self.base).await?;
        let path = self.base.join(format!("scan-{}", Uuid::new_v4()));
        // `create_dir` (not `_all`) fails if the name is somehow taken.
        fs::create_dir(&path).await?;
        let root = fs::canonicalize(&path).await?;
        debug!("acquired workspace {}", root.display());
        Ok(Workspace::new(root))
    }

    async fn release(&self, workspace: Workspace) {
        match fs::remove_dir_all(workspace.root()).await {
            Ok(()) => debug!("released workspace {}", workspace.root().display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("workspace {} already gone", workspace.root().display());
            }
            Err(err) => warn!(
                "failed to remove workspace {}: {}",
                workspace.root().display(),
                err
            ),
        }
    }
}
