//! Represents the destination bucket, the top-level container for assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved storage bucket.
///
/// Handed out by the provisioner once the bucket is known to exist and passed
/// to every upload of the run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name (must conform to DNS naming rules).
    pub name: String,

    /// Region where the bucket is hosted (e.g. "us-west-2").
    pub region: String,

    /// When this bucket was created, if the backend reports it.
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of looking a bucket up by name.
///
/// Failures other than "does not exist" travel in the `Err` side of the
/// surrounding `Result`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketLookup {
    Found(Bucket),
    NotFound,
}
