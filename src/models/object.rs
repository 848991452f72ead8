//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Metadata of a single live object as the scanner sees it.
///
/// The payload bytes live on disk; this row only tells us the key, the size
/// used by the size gate, and enough bookkeeping to log meaningful context.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Object key (path-like identifier within the bucket). Untrusted.
    pub key: String,

    /// Size in bytes as reported by the store.
    pub size_bytes: i64,

    /// MD5 checksum recorded at upload time, if any.
    pub etag: Option<String>,

    /// Timestamp when the object was last modified.
    pub last_modified: DateTime<Utc>,
}
