use crate::{models::acl::AccessLevel, services::storage_service::StorageError};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures that abort a sync run.
///
/// There are no retries: the first error stops the run, and objects already
/// pushed stay in the bucket.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not provision bucket `{bucket}`: {source}")]
    Provisioning {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("invalid upload pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("pattern `{pattern}` matched `{}` outside the asset root", path.display())]
    OutsideRoot { pattern: String, path: PathBuf },

    #[error("could not read `{}`: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not store object `{key}`: {source}")]
    RemoteStore {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("could not apply `{access}` grant to object `{key}`: {source}")]
    RemoteGrant {
        key: String,
        access: AccessLevel,
        #[source]
        source: StorageError,
    },

    #[error("sync cancelled after {uploaded} of {total} files")]
    Cancelled { uploaded: usize, total: usize },
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn provisioning(bucket: &str, source: StorageError) -> Self {
        Self::Provisioning {
            bucket: bucket.to_string(),
            source,
        }
    }

    pub fn local_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalRead {
            path: path.into(),
            source,
        }
    }
}
