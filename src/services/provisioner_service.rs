//! src/services/provisioner_service.rs
//!
//! Resolves the destination bucket, creating it on first use.

use crate::{
    config::SyncConfig,
    errors::{SyncError, SyncResult},
    models::bucket::{Bucket, BucketLookup},
    services::storage_service::{ObjectStorage, StorageError},
};
use tracing::info;

pub struct BucketProvisioner<'a, S: ObjectStorage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: ObjectStorage + ?Sized> BucketProvisioner<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Find the configured bucket, or create it with the configured default
    /// grant and region and fetch it again. Any failure other than "not
    /// found" is fatal.
    pub async fn ensure_bucket(&self, config: &SyncConfig) -> SyncResult<Bucket> {
        let name = config.bucket.as_str();
        let provisioning = |err| SyncError::provisioning(name, err);

        if let BucketLookup::Found(bucket) =
            self.storage.find_bucket(name).await.map_err(provisioning)?
        {
            return Ok(bucket);
        }

        info!("Bucket not found. Creating '{}'...", name);
        self.storage
            .create_bucket(name, &config.region, config.access)
            .await
            .map_err(provisioning)?;

        match self.storage.find_bucket(name).await.map_err(provisioning)? {
            BucketLookup::Found(bucket) => Ok(bucket),
            BucketLookup::NotFound => Err(provisioning(StorageError::BucketNotFound(
                name.to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::acl::AccessLevel,
        services::storage_service::testing::{Call, RecordingStorage},
    };

    #[tokio::test]
    async fn existing_bucket_is_returned_without_create() {
        let storage = RecordingStorage::new().with_bucket("assets-bucket");
        let config = SyncConfig::sample("assets-bucket");

        let bucket = BucketProvisioner::new(&storage)
            .ensure_bucket(&config)
            .await
            .unwrap();

        assert_eq!(bucket.name, "assets-bucket");
        assert_eq!(storage.calls(), vec![Call::FindBucket("assets-bucket".into())]);
    }

    #[tokio::test]
    async fn not_found_creates_once_then_refetches() {
        let storage = RecordingStorage::new();
        let mut config = SyncConfig::sample("assets-bucket");
        config.access = AccessLevel::Private;
        config.region = "eu-west-1".into();

        let bucket = BucketProvisioner::new(&storage)
            .ensure_bucket(&config)
            .await
            .unwrap();

        assert_eq!(bucket.name, "assets-bucket");
        assert_eq!(
            storage.calls(),
            vec![
                Call::FindBucket("assets-bucket".into()),
                Call::CreateBucket {
                    name: "assets-bucket".into(),
                    region: "eu-west-1".into(),
                    access: AccessLevel::Private,
                },
                Call::FindBucket("assets-bucket".into()),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_calls_are_idempotent() {
        let storage = RecordingStorage::new();
        let config = SyncConfig::sample("assets-bucket");
        let provisioner = BucketProvisioner::new(&storage);

        let first = provisioner.ensure_bucket(&config).await.unwrap();
        let second = provisioner.ensure_bucket(&config).await.unwrap();

        assert_eq!(first, second);
        let creates = storage
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::CreateBucket { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn lookup_failure_is_fatal() {
        let storage = RecordingStorage::new().failing_find("access denied");
        let config = SyncConfig::sample("assets-bucket");

        let err = BucketProvisioner::new(&storage)
            .ensure_bucket(&config)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Provisioning { ref bucket, .. } if bucket == "assets-bucket"));
        assert!(err.to_string().contains("access denied"));
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn create_failure_is_fatal() {
        let storage = RecordingStorage::new().failing_create();
        let config = SyncConfig::sample("assets-bucket");

        let err = BucketProvisioner::new(&storage)
            .ensure_bucket(&config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Provisioning {
                source: StorageError::BucketAlreadyExists(_),
                ..
            }
        ));
        assert_eq!(storage.calls().len(), 2);
    }

    #[tokio::test]
    async fn bucket_missing_after_create_is_fatal() {
        let storage = RecordingStorage::new().forgetting_creates();
        let config = SyncConfig::sample("assets-bucket");

        let err = BucketProvisioner::new(&storage)
            .ensure_bucket(&config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Provisioning {
                source: StorageError::BucketNotFound(_),
                ..
            }
        ));
        assert_eq!(storage.calls().len(), 3);
    }
}
