//! src/services/storage_service.rs
//!
//! The storage-service boundary: the handful of bucket and object calls a sync
//! run needs, plus the error type shared by every backend.

use crate::models::{acl::AccessLevel, bucket::BucketLookup, metadata::UploadMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("region `{0}` is not supported")]
    UnsupportedRegion(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("storage service error: {0}")]
    Backend(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object-storage client used by the provisioner and the uploader.
///
/// A client is connected (credentials resolved, session set up) when it is
/// constructed; the methods here only issue requests.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Look a bucket up by name. "Does not exist" is `Ok(BucketLookup::NotFound)`.
    async fn find_bucket(&self, name: &str) -> StorageResult<BucketLookup>;

    /// Create a bucket with the given default grant.
    async fn create_bucket(&self, name: &str, region: &str, access: AccessLevel)
    -> StorageResult<()>;

    /// Store `body` under `key`, overwriting any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<()>;

    /// Replace the grant on an existing object.
    async fn set_object_acl(&self, bucket: &str, key: &str, access: AccessLevel)
    -> StorageResult<()>;

    /// True when `put_object` already applies `metadata.access`, making a
    /// follow-up `set_object_acl` redundant.
    fn applies_grant_on_put(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory storage that records every call, for orchestration tests.

    use super::*;
    use crate::models::bucket::Bucket;
    use std::{
        collections::{BTreeMap, BTreeSet},
        sync::Mutex,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        FindBucket(String),
        CreateBucket {
            name: String,
            region: String,
            access: AccessLevel,
        },
        PutObject {
            bucket: String,
            key: String,
        },
        SetAcl {
            bucket: String,
            key: String,
            access: AccessLevel,
        },
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedObject {
        pub body: Vec<u8>,
        pub headers: BTreeMap<&'static str, String>,
        pub acl: Option<AccessLevel>,
    }

    #[derive(Default)]
    struct State {
        buckets: BTreeSet<String>,
        calls: Vec<Call>,
        objects: BTreeMap<String, RecordedObject>,
        fail_find: Option<String>,
        fail_create: bool,
        forget_creates: bool,
        fail_put_key: Option<String>,
        fail_acl_key: Option<String>,
    }

    #[derive(Default)]
    pub struct RecordingStorage {
        state: Mutex<State>,
        atomic_grant: bool,
    }

    impl RecordingStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_bucket(self, name: &str) -> Self {
            self.state.lock().unwrap().buckets.insert(name.to_string());
            self
        }

        pub fn with_atomic_grant(mut self) -> Self {
            self.atomic_grant = true;
            self
        }

        pub fn failing_find(self, message: &str) -> Self {
            self.state.lock().unwrap().fail_find = Some(message.to_string());
            self
        }

        pub fn failing_create(self) -> Self {
            self.state.lock().unwrap().fail_create = true;
            self
        }

        /// Accept `create_bucket` calls without the bucket ever showing up.
        pub fn forgetting_creates(self) -> Self {
            self.state.lock().unwrap().forget_creates = true;
            self
        }

        pub fn failing_put(self, key: &str) -> Self {
            self.state.lock().unwrap().fail_put_key = Some(key.to_string());
            self
        }

        pub fn failing_acl(self, key: &str) -> Self {
            self.state.lock().unwrap().fail_acl_key = Some(key.to_string());
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn objects(&self) -> BTreeMap<String, RecordedObject> {
            self.state.lock().unwrap().objects.clone()
        }
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn find_bucket(&self, name: &str) -> StorageResult<BucketLookup> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::FindBucket(name.to_string()));
            if let Some(message) = &state.fail_find {
                return Err(StorageError::Backend(message.clone()));
            }
            if state.buckets.contains(name) {
                Ok(BucketLookup::Found(Bucket {
                    name: name.to_string(),
                    region: "us-east-1".into(),
                    created_at: None,
                }))
            } else {
                Ok(BucketLookup::NotFound)
            }
        }

        async fn create_bucket(
            &self,
            name: &str,
            region: &str,
            access: AccessLevel,
        ) -> StorageResult<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::CreateBucket {
                name: name.to_string(),
                region: region.to_string(),
                access,
            });
            if state.fail_create {
                return Err(StorageError::BucketAlreadyExists(name.to_string()));
            }
            if !state.forget_creates {
                state.buckets.insert(name.to_string());
            }
            Ok(())
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Bytes,
            metadata: &UploadMetadata,
        ) -> StorageResult<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::PutObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
            if state.fail_put_key.as_deref() == Some(key) {
                return Err(StorageError::Backend("put rejected".into()));
            }
            let acl = self.atomic_grant.then_some(metadata.access);
            state.objects.insert(
                key.to_string(),
                RecordedObject {
                    body: body.to_vec(),
                    headers: metadata.headers(),
                    acl,
                },
            );
            Ok(())
        }

        async fn set_object_acl(
            &self,
            bucket: &str,
            key: &str,
            access: AccessLevel,
        ) -> StorageResult<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::SetAcl {
                bucket: bucket.to_string(),
                key: key.to_string(),
                access,
            });
            if state.fail_acl_key.as_deref() == Some(key) {
                return Err(StorageError::Backend("grant rejected".into()));
            }
            match state.objects.get_mut(key) {
                Some(object) => {
                    object.acl = Some(access);
                    Ok(())
                }
                None => Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
            }
        }

        fn applies_grant_on_put(&self) -> bool {
            self.atomic_grant
        }
    }
}
