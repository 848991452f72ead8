//! Represents a logical bucket as recorded by the object store.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket row, reduced to the columns the scanner needs to
/// resolve objects and their on-disk payloads.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Internal UUID used to join against `objects.bucket_id`.
    pub id: Uuid,

    /// Globally unique bucket name (S3 naming rules).
    pub name: String,
}
