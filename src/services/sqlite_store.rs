//! src/services/sqlite_store.rs
//!
//! Read-only access to the object store service's durable state: metadata
//! rows in SQLite and payloads on local disk sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. The scanner never writes here.

use crate::{
    models::{bucket::Bucket, object::StoredObject},
    services::object_store::{ListPage, ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufReader},
};
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
pub const MAX_LIST_PAGE: usize = 1000;
const COPY_CHUNK: usize = 1024 * 1024;

/// Object store backend reading the store service's SQLite metadata and
/// on-disk payloads.
#[derive(Clone)]
pub struct SqliteObjectStore {
    /// Shared SQLite connection pool used for metadata lookups.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    page_size: usize,
}

impl SqliteObjectStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            page_size: page_size.clamp(1, MAX_LIST_PAGE),
        }
    }

    /// Compute the physical base folder path for a bucket.
    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers: the first two bytes of MD5(bucket/key).
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path for an object. Does not check existence.
    pub fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> StoreResult<Bucket> {
        validate_bucket_name(bucket)?;
        sqlx::query_as::<Sqlite, Bucket>("SELECT id, name FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => StoreError::BucketNotFound(bucket.to_string()),
                other => StoreError::Sqlx(other),
            })
    }

    /// Fetch a non-deleted object metadata record.
    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> StoreResult<StoredObject> {
        sqlx::query_as::<Sqlite, StoredObject>(
            "SELECT key, size_bytes, etag, last_modified
             FROM objects
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0",
        )
        .bind(key)
        .bind(bucket.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::ObjectNotFound {
                bucket: bucket.name.clone(),
                key: key.to_string(),
            },
            other => StoreError::Sqlx(other),
        })
    }
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    /// Lexically ordered listing of live keys. The continuation token is the
    /// base64 of the last key of the previous page.
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let fetch_limit = self.page_size + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT key, size_bytes, etag, last_modified FROM objects WHERE bucket_id = ",
        );
        builder.push_bind(bucket_rec.id);
        builder.push(" AND is_deleted = 0");
        if let Some(token) = continuation_token {
            builder.push(" AND key > ");
            builder.push_bind(decode_continuation_token(token));
        }
        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<StoredObject> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut next_token = None;
        if rows.len() == fetch_limit {
            rows.truncate(self.page_size);
            next_token = rows.last().map(|last| encode_continuation_token(&last.key));
        }

        Ok(ListPage {
            keys: rows.into_iter().map(|obj| obj.key).collect(),
            next_token,
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<u64> {
        ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;
        debug!(
            bucket,
            key,
            etag = object.etag.as_deref().unwrap_or(""),
            last_modified = %object.last_modified,
            "object metadata"
        );
        Ok(object.size_bytes.max(0) as u64)
    }

    /// Copy the payload out of the store. A metadata row whose payload file is
    /// missing is reported as `ObjectNotFound`.
    async fn get(&self, bucket: &str, key: &str, local_path: &Path) -> StoreResult<()> {
        ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        self.fetch_object(&bucket_rec, key).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let src = match fs::File::open(&file_path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        // Dropping this future stops the transfer at the next chunk.
        let mut src = BufReader::with_capacity(COPY_CHUNK, src);
        let mut dst = fs::File::create(local_path).await?;
        let bytes = tokio::io::copy_buf(&mut src, &mut dst).await?;
        dst.flush().await?;
        debug!("copied {} bytes from {}", bytes, file_path.display());
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Basic key validation mirroring the store's own write-side rules, so a key
/// the store could never have accepted is rejected before touching disk.
fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StoreError::InvalidObjectKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StoreError::InvalidObjectKey);
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn validate_bucket_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    if name.trim() != name {
        return Err(invalid("cannot begin or end with whitespace"));
    }
    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

fn encode_continuation_token(key: &str) -> String {
    general_purpose::STANDARD.encode(key)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
