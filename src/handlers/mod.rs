//! HTTP handlers and the state they share.

use crate::services::{invoker::Invoker, object_store::ObjectStore};
use std::{path::PathBuf, sync::Arc};

pub mod health_handlers;
pub mod scan_handlers;

/// Shared state carried by the router.
#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<Invoker>,
    pub store: Arc<dyn ObjectStore>,
    pub workspace_root: PathBuf,
}
