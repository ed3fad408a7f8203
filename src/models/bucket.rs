//! Represents a logical bucket - a top-level container for uploaded files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket holding certificate uploads and any other objects.
///
/// Buckets act as namespaces for objects; every finalize event names the
/// bucket its object was written to.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Bucket name (lowercase, DNS-style).
    pub name: String,

    /// Region label (e.g. "local").
    pub region: String,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
