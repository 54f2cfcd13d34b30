//! Represents files picked up for upload and objects stored in a bucket.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A local file matched by one of the upload patterns.
///
/// Lives for a single sync run; consumed once by the uploader.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LocatedFile {
    /// Absolute path of the file on disk.
    pub local_path: PathBuf,

    /// Object key within the bucket, `/`-separated, without any `.gz` suffix.
    pub remote_key: String,

    /// The payload on disk is gzip-compressed.
    pub gzip: bool,
}

/// Metadata record for an object held by the local store, read back when
/// inspecting what a sync stored.
#[cfg(test)]
#[derive(Serialize, Deserialize, Clone, sqlx::FromRow, Debug)]
pub struct StoredObject {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: String,

    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<chrono::DateTime<chrono::Utc>>,
    pub content_encoding: Option<String>,

    /// Canned grant currently applied (e.g. "public-read").
    pub acl: String,

    /// Timestamp when object was last written.
    pub last_modified: chrono::DateTime<chrono::Utc>,
}
