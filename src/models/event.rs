//! Invocation events accepted by the orchestrator.
//!
//! A storage notification carries one or more records naming an object; a
//! manual or scheduled call carries none and optionally names a bucket.

use serde::Deserialize;

/// Top-level invocation payload.
///
/// Accepts the S3 event notification layout (`Records[].s3.bucket.name`,
/// `Records[].s3.object.key`) so upload notifications can be forwarded as-is.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InvocationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,

    /// Bucket to scan in batch mode; overrides the configured bucket.
    #[serde(default)]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    /// Size announced by the notification. Informational only; the size gate
    /// always asks the store.
    #[serde(default)]
    pub size: Option<u64>,
}

impl InvocationEvent {
    /// Event for a single object, as built by the `/scan/{bucket}/{*key}` route.
    pub fn single(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            records: vec![NotificationRecord {
                s3: S3Entity {
                    bucket: BucketRef {
                        name: bucket.into(),
                    },
                    object: ObjectRef {
                        key: key.into(),
                        size: None,
                    },
                },
            }],
            bucket: None,
        }
    }

    /// Event requesting a batch scan of `bucket`.
    pub fn batch(bucket: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            bucket: Some(bucket.into()),
        }
    }
}
